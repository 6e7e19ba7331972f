//! Crawler output loading and conversion into chunks.
//!
//! The crawler writes JSON files into the raw-data directory. A file holds
//! either one document object or an array of them:
//!
//! ```json
//! [{ "url": "https://example.com/tariffs/mobile",
//!    "title": "mobile",
//!    "text": "Paragraph one.\n\nParagraph two.",
//!    "metadata": { "lang": "ru" } }]
//! ```
//!
//! Files are read in sorted name order so that chunk positions, and therefore
//! index positions, are reproducible between builds.

use crate::error::{Result, RetrieverError};
use crate::storage::Chunk;
use serde::Deserialize;
use serde_json::Value;
use sift_ai_context::{Metadata, ParagraphChunker};
use std::path::Path;
use url::Url;

/// One crawled page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Documents without text are skipped.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFile {
    Many(Vec<RawDocument>),
    One(RawDocument),
}

/// The documents of one raw JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// File name, e.g. `tariffs.json`
    pub name: String,
    /// File name without extension, used as the chunk id prefix
    pub stem: String,
    pub documents: Vec<RawDocument>,
}

/// Page title derived from a URL: its last non-empty path segment, or `home`.
///
/// ```
/// use sift_ai_retriever::retrieval::documents::derive_title;
///
/// assert_eq!(derive_title("https://example.com/tariffs/mobile/"), "mobile");
/// assert_eq!(derive_title("https://example.com/"), "home");
/// ```
pub fn derive_title(url: &str) -> String {
    let last_segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string)),
        Err(_) => url
            .split('/')
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string),
    };
    last_segment.unwrap_or_else(|| "home".to_string())
}

/// Read every `*.json` file in `dir`, in name order.
pub async fn load_raw_documents(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RetrieverError::from_io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file()
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(&path).await?;
        let documents = match serde_json::from_str::<RawFile>(&content)? {
            RawFile::Many(documents) => documents,
            RawFile::One(document) => vec![document],
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!("Read {} documents from {}", documents.len(), name);
        files.push(SourceFile {
            name,
            stem,
            documents,
        });
    }

    tracing::info!("Loaded {} raw files from {}", files.len(), dir.display());
    Ok(files)
}

/// Chunk every document, assigning ids `<stem>_<ordinal>` where the ordinal
/// counts chunks across the whole file.
pub fn build_chunks(files: &[SourceFile], chunker: &ParagraphChunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for file in files {
        let mut ordinal = 0usize;
        for document in &file.documents {
            let Some(text) = document.text.as_deref() else {
                tracing::debug!("Skipping document without text in {}", file.name);
                continue;
            };

            let metadata = document_metadata(document, &file.name);
            for draft in chunker.chunk(text, &metadata) {
                if draft.text.is_empty() {
                    continue;
                }
                chunks.push(Chunk::from_draft(format!("{}_{ordinal}", file.stem), draft));
                ordinal += 1;
            }
        }
    }

    tracing::info!("Built {} chunks from {} files", chunks.len(), files.len());
    chunks
}

fn document_metadata(document: &RawDocument, file_name: &str) -> Metadata {
    let source_url = document
        .url
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let title = document
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| derive_title(&source_url));

    let mut metadata = Metadata::new();
    metadata.insert("source_url".to_string(), source_url);
    metadata.insert("title".to_string(), title);
    metadata.insert("source_file".to_string(), file_name.to_string());

    for (key, value) in &document.metadata {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        metadata.insert(key.clone(), value);
    }

    metadata
}
