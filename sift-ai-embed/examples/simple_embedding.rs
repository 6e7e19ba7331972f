//! Generate a few embeddings with the default multilingual model and compare them.

use sift_ai_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EmbedConfig::default().with_batch_size(2);

    println!("Creating FastEmbed provider:");
    println!("   Model: {}", config.model);
    println!("   Batch size: {}", config.batch_size);
    println!("   Normalize: {}", config.normalize);

    let provider = FastEmbedProvider::create(config).await?;
    println!("   Dimension: {}", provider.embedding_dimension());

    let texts = vec![
        "Как подключить домашний интернет?".to_string(),
        "How do I connect home internet?".to_string(),
        "Recipe for a chocolate cake".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;

    let query = &result.embeddings[0];
    for (text, embedding) in texts.iter().zip(&result.embeddings) {
        let similarity: f32 = query.iter().zip(embedding).map(|(a, b)| a * b).sum();
        println!("   {similarity:.3}  {text}");
    }

    Ok(())
}
