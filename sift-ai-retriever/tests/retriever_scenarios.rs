//! End-to-end retrieval behaviour with deterministic embedders.

mod common;

use anyhow::Result;
use common::{HashingEmbedder, TableEmbedder};
use sift_ai_context::Metadata;
use sift_ai_retriever::{
    RetrieverError,
    retrieval::{RetrievalOptions, Retriever},
    storage::{Chunk, FlatIndex, Metric, Precision, VectorIndex, chunk_store::save_chunks},
};
use std::sync::Arc;
use tempfile::tempdir;

fn chunk(id: &str, text: &str, url: &str) -> Chunk {
    let mut metadata = Metadata::new();
    metadata.insert("source_url".to_string(), url.to_string());
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        metadata,
    }
}

fn orthonormal() -> Arc<TableEmbedder> {
    Arc::new(TableEmbedder::new(&[
        ("A", vec![1.0, 0.0, 0.0]),
        ("B", vec![0.0, 1.0, 0.0]),
        ("C", vec![0.0, 0.0, 1.0]),
    ]))
}

fn abc_chunks() -> Vec<Chunk> {
    vec![
        chunk("abc_0", "A", "https://example.com/a"),
        chunk("abc_1", "B", "https://example.com/b"),
        chunk("abc_2", "C", "https://example.com/c"),
    ]
}

/// Three orthonormal chunks: querying one of them returns exactly that one.
#[tokio::test]
async fn test_orthonormal_query_returns_single_exact_match() -> Result<()> {
    let retriever = Retriever::new(orthonormal(), RetrievalOptions::default());
    retriever.index_documents(abc_chunks()).await?;

    let results = retriever.search("A", 3, 0.35).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "A");
    assert_eq!(results[0].chunk_id, "abc_0");
    assert_eq!(results[0].rank, 1);
    assert!((results[0].score - 1.0).abs() < 1e-6);

    let formatted = retriever.retrieve("A", 3, 0.35, false).await?;
    assert_eq!(formatted.len(), 1);
    assert_eq!(formatted[0].source_url, "https://example.com/a");
    assert_eq!(formatted[0].title, "info");
    Ok(())
}

/// Raising the threshold never adds results.
#[tokio::test]
async fn test_threshold_monotonicity() -> Result<()> {
    let embedder = Arc::new(HashingEmbedder { dimension: 64 });
    let retriever = Retriever::new(embedder, RetrievalOptions::default());
    retriever
        .index_documents(vec![
            chunk("t_0", "mobile tariff with unlimited internet", "u0"),
            chunk("t_1", "home internet tariff for families", "u1"),
            chunk("t_2", "how to pay your bill online", "u2"),
            chunk("t_3", "roaming tariff abroad", "u3"),
            chunk("t_4", "unlimited calls and internet", "u4"),
        ])
        .await?;

    let query = "unlimited internet tariff";
    let mut previous: Option<Vec<String>> = None;
    for threshold in [-1.0, 0.0, 0.2, 0.4, 0.6, 0.8, 1.01] {
        let ids: Vec<String> = retriever
            .search(query, 5, threshold)
            .await?
            .into_iter()
            .map(|r| r.chunk_id)
            .collect();
        if let Some(previous) = &previous {
            assert!(
                ids.iter().all(|id| previous.contains(id)),
                "threshold {threshold} added results: {ids:?} not within {previous:?}"
            );
        }
        previous = Some(ids);
    }
    assert_eq!(previous, Some(Vec::new()));
    Ok(())
}

/// Result i always carries the text of chunk i.
#[tokio::test]
async fn test_positional_alignment() -> Result<()> {
    let embedder = Arc::new(HashingEmbedder { dimension: 128 });
    let texts = [
        "alpha bravo",
        "charlie delta",
        "echo foxtrot",
        "golf hotel",
        "india juliett",
    ];
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| chunk(&format!("nato_{i}"), t, "u"))
        .collect();

    let retriever = Retriever::new(embedder, RetrievalOptions::default());
    retriever.index_documents(chunks).await?;

    for (i, text) in texts.iter().enumerate() {
        let results = retriever.search(text, 1, 0.0).await?;
        assert_eq!(results[0].chunk_id, format!("nato_{i}"));
        assert_eq!(results[0].text, *text);
    }
    Ok(())
}

/// Results come back best-first with contiguous ranks.
#[tokio::test]
async fn test_ranks_are_contiguous_and_ordered() -> Result<()> {
    let retriever = Retriever::new(
        Arc::new(HashingEmbedder { dimension: 64 }),
        RetrievalOptions::default(),
    );
    retriever
        .index_documents(vec![
            chunk("r_0", "tariff", "u"),
            chunk("r_1", "tariff internet", "u"),
            chunk("r_2", "tariff internet mobile", "u"),
        ])
        .await?;

    let results = retriever.search("tariff internet mobile", 3, -1.0).await?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk_id, "r_2");
    for (i, pair) in results.windows(2).enumerate() {
        assert!(pair[0].score >= pair[1].score);
        assert_eq!(pair[0].rank, i + 1);
    }
    assert_eq!(results[2].rank, 3);
    Ok(())
}

#[tokio::test]
async fn test_save_then_open_answers_identically() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("data/index.sift");
    let chunks_path = dir.path().join("data/processed/documents.json");

    let options = RetrievalOptions {
        precision: Precision::F16,
        ..RetrievalOptions::default()
    };
    let built = Retriever::new(orthonormal(), options);
    built.index_documents(abc_chunks()).await?;
    built.save(&index_path, &chunks_path).await?;

    let opened = Retriever::open(orthonormal(), options, &index_path, &chunks_path).await?;
    assert!(opened.is_indexed().await);
    assert_eq!(opened.len().await, 3);

    for query in ["A", "B", "C"] {
        assert_eq!(
            opened.search(query, 3, 0.35).await?,
            built.search(query, 3, 0.35).await?
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_huge_top_k_returns_every_match() -> Result<()> {
    let retriever = Retriever::new(orthonormal(), RetrievalOptions::default());
    retriever.index_documents(abc_chunks()).await?;

    let results = retriever.search("A", usize::MAX, -1.0).await?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "A");

    let reranked = retriever.retrieve("A", usize::MAX / 2 + 1, -1.0, true).await?;
    assert_eq!(reranked.len(), 3);
    Ok(())
}

/// A save that fails part-way leaves the previous index and chunk store
/// answering together.
#[tokio::test]
async fn test_failed_save_keeps_previous_corpus_aligned() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("index.sift");
    let chunks_path = dir.path().join("documents.json");

    let old = Retriever::new(orthonormal(), RetrievalOptions::default());
    old.index_documents(vec![
        chunk("page_0", "A", "https://example.com/a"),
        chunk("page_1", "B", "https://example.com/b"),
    ])
    .await?;
    old.save(&index_path, &chunks_path).await?;

    let new = Retriever::new(orthonormal(), RetrievalOptions::default());
    new.index_documents(vec![
        chunk("page_0", "B", "https://example.com/b"),
        chunk("page_1", "A", "https://example.com/a"),
    ])
    .await?;
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, "")?;
    assert!(
        new.save(&index_path, &blocker.join("documents.json"))
            .await
            .is_err()
    );

    let reopened = Retriever::open(
        orthonormal(),
        RetrievalOptions::default(),
        &index_path,
        &chunks_path,
    )
    .await?;
    let results = reopened.search("A", 1, 0.35).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "page_0");
    assert_eq!(results[0].text, "A");
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_index_from_another_build() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("index.sift");
    let chunks_path = dir.path().join("documents.json");

    let reversed: Vec<Chunk> = abc_chunks().into_iter().rev().collect();
    let newer = Retriever::new(orthonormal(), RetrievalOptions::default());
    newer.index_documents(reversed).await?;
    newer.corpus().await.index().save(&index_path)?;
    save_chunks(&chunks_path, &abc_chunks()).await?;

    let err = Retriever::open(
        orthonormal(),
        RetrievalOptions::default(),
        &index_path,
        &chunks_path,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RetrieverError::StaleArtifacts { .. }));
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_misaligned_artifacts() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("index.sift");
    let chunks_path = dir.path().join("documents.json");

    let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
    index.add(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])?;
    index.save(&index_path)?;
    save_chunks(&chunks_path, &abc_chunks()).await?;

    let err = Retriever::open(
        orthonormal(),
        RetrievalOptions::default(),
        &index_path,
        &chunks_path,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        RetrieverError::ArtifactMismatch {
            vectors: 2,
            chunks: 3
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_wrong_dimension() -> Result<()> {
    let dir = tempdir()?;
    let index_path = dir.path().join("index.sift");
    let chunks_path = dir.path().join("documents.json");

    let built = Retriever::new(
        Arc::new(HashingEmbedder { dimension: 16 }),
        RetrievalOptions::default(),
    );
    built.index_documents(abc_chunks()).await?;
    built.save(&index_path, &chunks_path).await?;

    let err = Retriever::open(
        orthonormal(),
        RetrievalOptions::default(),
        &index_path,
        &chunks_path,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        RetrieverError::DimensionMismatch {
            expected: 3,
            actual: 16
        }
    ));
    Ok(())
}

/// A rebuild is published atomically: concurrent searches see either the old
/// corpus or the new one, never a mix.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuild_is_atomic_for_concurrent_searches() -> Result<()> {
    let embedder = Arc::new(TableEmbedder::new(&[
        ("old", vec![1.0, 0.0]),
        ("new", vec![1.0, 0.0]),
        ("q", vec![1.0, 0.0]),
    ]));
    let retriever = Arc::new(Retriever::new(embedder, RetrievalOptions::default()));
    retriever
        .index_documents(vec![chunk("old_0", "old", "u"), chunk("old_1", "old", "u")])
        .await?;

    let mut readers = Vec::new();
    for _ in 0..8 {
        let retriever = Arc::clone(&retriever);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let results = retriever.search("q", 5, 0.5).await.unwrap();
                let generation: Vec<_> = results
                    .iter()
                    .map(|r| r.chunk_id.split('_').next().unwrap().to_string())
                    .collect();
                assert!(!generation.is_empty());
                assert!(generation.iter().all(|g| g == &generation[0]));
                let expected = if generation[0] == "old" { 2 } else { 3 };
                assert_eq!(results.len(), expected);
                tokio::task::yield_now().await;
            }
        }));
    }

    retriever
        .index_documents(vec![
            chunk("new_0", "new", "u"),
            chunk("new_1", "new", "u"),
            chunk("new_2", "new", "u"),
        ])
        .await?;

    for reader in readers {
        reader.await?;
    }
    assert_eq!(retriever.len().await, 3);
    Ok(())
}
