//! Storage layer for sift-ai-retriever
//!
//! Two artifacts make up a persisted corpus, and they are only meaningful
//! together:
//!
//! - the **vector index** ([`VectorIndex`], implemented by
//!   [`flat_index::FlatIndex`]): one embedding per chunk, searched by k-NN;
//! - the **chunk store** ([`chunk_store`]): the ordered array of [`Chunk`]s.
//!
//! ## Positional alignment
//!
//! The index knows nothing about chunk ids. Vector *i* belongs to chunk *i*,
//! so both artifacts must always be written from the same build and have the
//! same length. The index header also carries a [`Fingerprint`] of the chunk
//! sequence it was built from, and [`crate::retrieval::Corpus`] checks both
//! when loading. Artifacts are staged next to their destination and only
//! renamed into place once every write has succeeded.
//!
//! ## Metrics
//!
//! ```text
//! InnerProduct  higher is better   threshold is a minimum score
//! L2            lower is better    threshold is a maximum distance
//! ```
//!
//! Every comparison goes through [`Metric`] so callers never mix the two
//! conventions up.

use crate::error::{Result, RetrieverError};
use serde::{Deserialize, Serialize};
use sift_ai_context::{ChunkDraft, Metadata};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;

pub mod chunk_store;
pub mod flat_index;

pub use flat_index::FlatIndex;

/// A retrievable passage. See module docs for the alignment rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn from_draft(id: impl Into<String>, draft: ChunkDraft) -> Self {
        Self {
            id: id.into(),
            text: draft.text,
            metadata: draft.metadata,
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.metadata.get("source_url").map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").map(String::as_str)
    }
}

/// Digest identifying the chunk sequence an index was built from.
pub type Fingerprint = blake3::Hash;

/// Fingerprint carried by an index that was never paired with chunks.
pub fn unstamped() -> Fingerprint {
    blake3::Hash::from_bytes([0; 32])
}

/// Digest of the chunk count and the ordered ids and texts.
pub fn fingerprint(chunks: &[Chunk]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(chunks.len() as u64).to_le_bytes());
    for chunk in chunks {
        for field in [&chunk.id, &chunk.text] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hasher.finalize()
}

/// Similarity function used by an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    /// Dot product. Equals cosine similarity for unit vectors.
    #[default]
    InnerProduct,
    /// Squared Euclidean distance.
    L2,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::InnerProduct => "inner_product",
            Metric::L2 => "l2",
        }
    }

    /// Score of `vector` against `query`.
    pub fn score(self, query: &[f32], vector: impl Iterator<Item = f32>) -> f32 {
        match self {
            Metric::InnerProduct => query.iter().zip(vector).map(|(q, v)| q * v).sum(),
            Metric::L2 => query
                .iter()
                .zip(vector)
                .map(|(q, v)| (q - v) * (q - v))
                .sum(),
        }
    }

    /// Best-first ordering of two scores.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::InnerProduct => b.total_cmp(&a),
            Metric::L2 => a.total_cmp(&b),
        }
    }

    /// Score carried by padding entries; every real score ranks ahead of it.
    pub fn worst(self) -> f32 {
        match self {
            Metric::InnerProduct => f32::NEG_INFINITY,
            Metric::L2 => f32::INFINITY,
        }
    }

    /// Threshold test: a minimum score for inner product, a maximum distance for L2.
    pub fn passes(self, score: f32, threshold: f32) -> bool {
        match self {
            Metric::InnerProduct => score >= threshold,
            Metric::L2 => score <= threshold,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Metric::InnerProduct => 0,
            Metric::L2 => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Metric::InnerProduct),
            1 => Some(Metric::L2),
            _ => None,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inner_product" | "ip" | "indexflatip" => Ok(Metric::InnerProduct),
            "l2" | "indexflatl2" => Ok(Metric::L2),
            _ => Err(format!("Invalid metric: {s}")),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.name().to_string()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type used to store vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Precision {
    /// Exact storage.
    #[default]
    F32,
    /// Half the memory; scores are computed from the widened values.
    F16,
}

impl Precision {
    pub fn name(self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F16 => 2,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Precision::F32 => 0,
            Precision::F16 => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Precision::F32),
            1 => Some(Precision::F16),
            _ => None,
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f32" | "float32" => Ok(Precision::F32),
            "f16" | "float16" | "half" => Ok(Precision::F16),
            _ => Err(format!("Invalid precision: {s}")),
        }
    }
}

impl TryFrom<String> for Precision {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Precision> for String {
    fn from(precision: Precision) -> Self {
        precision.name().to_string()
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a k-NN answer. `position` is `None` for padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: Option<usize>,
    pub score: f32,
}

impl Neighbor {
    pub fn missing(metric: Metric) -> Self {
        Self {
            position: None,
            score: metric.worst(),
        }
    }
}

/// Append-only vector collection with exact k-NN search.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    fn dimension(&self) -> usize;

    fn metric(&self) -> Metric;

    fn precision(&self) -> Precision;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in input order. Nothing is appended if any vector has
    /// the wrong dimension.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Exactly `k` neighbors, best first, padded with [`Neighbor::missing`].
    /// Implementations may refuse a `k` too large to materialize with
    /// [`RetrieverError::SearchLimit`].
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Fingerprint of the chunks these vectors belong to.
    fn fingerprint(&self) -> Fingerprint;

    fn set_fingerprint(&mut self, fingerprint: Fingerprint);

    /// The on-disk representation written by [`VectorIndex::save`].
    fn to_bytes(&self) -> Vec<u8>;

    /// Persist to `path`, creating parent directories. The previous file
    /// stays intact if the write fails.
    fn save(&self, path: &Path) -> Result<()> {
        commit_file(stage_file(path, &self.to_bytes())?, path)
    }

    /// Replace the contents with the index stored at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Write `bytes` to a temporary file in `path`'s directory. Nothing appears at
/// `path` until the file is handed to [`commit_file`].
pub(crate) fn stage_file(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Rename a staged file over `path`.
pub(crate) fn commit_file(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .persist(path)
        .map_err(|e| RetrieverError::Io(e.error))?;
    Ok(())
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RetrieverError::DimensionMismatch { expected, actual })
    }
}
