//! JSON persistence for the ordered chunk array.

use super::{Chunk, commit_file, stage_file};
use crate::error::{Result, RetrieverError};
use std::path::Path;

/// Read the chunk array stored at `path`.
pub async fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RetrieverError::from_io(path, e))?;
    let chunks: Vec<Chunk> = serde_json::from_str(&content)?;
    tracing::debug!("Loaded {} chunks from {}", chunks.len(), path.display());
    Ok(chunks)
}

/// Pretty-printed UTF-8 JSON, non-ASCII text left unescaped.
pub fn to_json(chunks: &[Chunk]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(chunks)?)
}

/// Replace the chunk store at `path`, creating parent directories. The old
/// file is kept if the write fails.
pub async fn save_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let json = to_json(chunks)?;
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || commit_file(stage_file(&target, &json)?, &target))
        .await??;
    tracing::info!("Saved {} chunks to {}", chunks.len(), path.display());
    Ok(())
}
