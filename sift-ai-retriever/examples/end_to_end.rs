//! End-to-end example: crawl output to answered questions
//!
//! This example shows how to:
//! 1. Write a few crawler-style JSON documents into a raw-data directory
//! 2. Chunk, embed and index them with `prepare`
//! 3. Reopen the persisted corpus and retrieve passages for questions
//! 4. Turn the passages into an answer with the extractive generator
//!
//! The first run downloads the default multilingual embedding model.

use anyhow::Result;
use sift_ai_embed::FastEmbedProvider;
use sift_ai_retriever::{
    config::SiftConfig,
    retrieval::{AnswerGenerator, ExtractiveGenerator, Retriever, prepare},
};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempdir()?;
    let mut config = SiftConfig::default();
    config.paths.raw_dir = temp_dir.path().join("raw");
    config.paths.chunks_path = temp_dir.path().join("processed/documents.json");
    config.paths.index_path = temp_dir.path().join("index.sift");

    std::fs::create_dir_all(&config.paths.raw_dir)?;
    std::fs::write(
        config.paths.raw_dir.join("site.json"),
        serde_json::to_string_pretty(&serde_json::json!([
            {
                "url": "https://example.com/tariffs/mobile",
                "text": "Mobile tariffs include unlimited messengers.\n\nThe basic plan costs 300 per month and includes 10 GB of traffic."
            },
            {
                "url": "https://example.com/internet/home",
                "text": "Home internet is available at speeds up to 1 Gbit/s.\n\nInstallation is free when you sign a one-year contract."
            },
            {
                "url": "https://example.com/support/roaming",
                "text": "Роуминг подключается автоматически при выезде за границу."
            }
        ]))?,
    )?;

    let embedder = Arc::new(FastEmbedProvider::create(config.embedding.clone()).await?);

    let builder = Retriever::new(embedder.clone(), config.retrieval_options());
    let report = prepare(&config, &builder).await?;
    println!("Indexed {} chunks from {} documents\n", report.chunks, report.documents);

    let retriever = Retriever::open(
        embedder,
        config.retrieval_options(),
        &config.paths.index_path,
        &config.paths.chunks_path,
    )
    .await?;
    let generator = ExtractiveGenerator::new(config.messages.source_label.clone());

    for question in [
        "How much does the basic mobile plan cost?",
        "Is home internet installation free?",
        "Как работает роуминг?",
        "What is the capital of France?",
    ] {
        println!("Question: {question}");
        let results = retriever.retrieve_with_defaults(question).await?;
        if results.is_empty() {
            println!("{}\n", config.messages.miss);
            continue;
        }
        for result in &results {
            println!("  {:.3} [{}]", result.score, result.title);
        }
        println!("{}\n", generator.generate(question, &results).await?);
    }

    Ok(())
}
