//! Exact brute-force vector index with a compact binary file format.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "SIFTVEC1"
//! 8       4     format version (u32, little-endian)
//! 12      1     metric     (0 = inner product, 1 = l2)
//! 13      1     precision  (0 = f32, 1 = f16)
//! 14      4     dimension  (u32)
//! 18      8     count      (u64)
//! 26      32    fingerprint of the chunk sequence (blake3)
//! 58      ...   count * dimension elements, row-major
//! ```

use super::{
    Fingerprint, Metric, Neighbor, Precision, VectorIndex, check_dimension, unstamped,
};
use crate::error::{Result, RetrieverError};
use half::f16;
use std::path::Path;

const MAGIC: &[u8; 8] = b"SIFTVEC1";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 58;

/// Largest `k` a single [`FlatIndex::search`] will pad to.
pub const MAX_SEARCH_K: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
}

impl Storage {
    fn empty(precision: Precision) -> Self {
        match precision {
            Precision::F32 => Storage::F32(Vec::new()),
            Precision::F16 => Storage::F16(Vec::new()),
        }
    }

    fn precision(&self) -> Precision {
        match self {
            Storage::F32(_) => Precision::F32,
            Storage::F16(_) => Precision::F16,
        }
    }

    fn element_count(&self) -> usize {
        match self {
            Storage::F32(data) => data.len(),
            Storage::F16(data) => data.len(),
        }
    }

    fn extend(&mut self, vector: &[f32]) {
        match self {
            Storage::F32(data) => data.extend_from_slice(vector),
            Storage::F16(data) => data.extend(vector.iter().map(|&x| f16::from_f32(x))),
        }
    }

    fn row_score(&self, metric: Metric, query: &[f32], row: usize) -> f32 {
        let dim = query.len();
        let range = row * dim..(row + 1) * dim;
        match self {
            Storage::F32(data) => metric.score(query, data[range].iter().copied()),
            Storage::F16(data) => metric.score(query, data[range].iter().map(|x| x.to_f32())),
        }
    }

    fn le_bytes(&self) -> Vec<u8> {
        match self {
            Storage::F32(data) if cfg!(target_endian = "little") => {
                bytemuck::cast_slice::<_, u8>(data.as_slice()).to_vec()
            }
            Storage::F16(data) if cfg!(target_endian = "little") => {
                bytemuck::cast_slice::<_, u8>(data.as_slice()).to_vec()
            }
            Storage::F32(data) => data.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Storage::F16(data) => data.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    fn from_le_bytes(precision: Precision, bytes: &[u8]) -> Self {
        match precision {
            Precision::F32 if cfg!(target_endian = "little") => {
                Storage::F32(bytemuck::pod_collect_to_vec(bytes))
            }
            Precision::F16 if cfg!(target_endian = "little") => {
                Storage::F16(bytemuck::pod_collect_to_vec(bytes))
            }
            Precision::F32 => Storage::F32(
                bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
            Precision::F16 => Storage::F16(
                bytes
                    .chunks_exact(2)
                    .map(|b| f16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            ),
        }
    }
}

/// Exact k-NN over every stored vector.
///
/// Ties are broken by the lower position so repeated searches return the same
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    storage: Storage,
    fingerprint: Fingerprint,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric, precision: Precision) -> Self {
        Self {
            dimension,
            metric,
            storage: Storage::empty(precision),
            fingerprint: unstamped(),
        }
    }

    /// Load an index from `path`, taking dimension, metric and precision from the file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut index = Self::new(0, Metric::default(), Precision::default());
        index.load(path)?;
        Ok(index)
    }

    /// Stored vector at `position`, widened to f32.
    #[cfg(test)]
    fn vector(&self, position: usize) -> Option<Vec<f32>> {
        if position >= self.len() {
            return None;
        }
        let range = position * self.dimension..(position + 1) * self.dimension;
        Some(match &self.storage {
            Storage::F32(data) => data[range].to_vec(),
            Storage::F16(data) => data[range].iter().map(|x| x.to_f32()).collect(),
        })
    }

    /// Decode the file format described in the module docs.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RetrieverError::CorruptIndex(format!(
                "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        if &bytes[0..8] != MAGIC {
            return Err(RetrieverError::CorruptIndex("bad magic bytes".to_string()));
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if version != FORMAT_VERSION {
            return Err(RetrieverError::CorruptIndex(format!(
                "unsupported format version {version}"
            )));
        }

        let metric = Metric::from_byte(bytes[12]).ok_or_else(|| {
            RetrieverError::CorruptIndex(format!("unknown metric tag {}", bytes[12]))
        })?;
        let precision = Precision::from_byte(bytes[13]).ok_or_else(|| {
            RetrieverError::CorruptIndex(format!("unknown precision tag {}", bytes[13]))
        })?;
        let dimension = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[18..26]);
        let count = u64::from_le_bytes(count_bytes);
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&bytes[26..HEADER_LEN]);

        if dimension == 0 {
            return Err(RetrieverError::CorruptIndex("dimension is zero".to_string()));
        }

        let payload = &bytes[HEADER_LEN..];
        let expected_len = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(dimension))
            .and_then(|elements| elements.checked_mul(precision.element_size()));
        if expected_len != Some(payload.len()) {
            return Err(RetrieverError::CorruptIndex(format!(
                "header declares {count} vectors of dimension {dimension} but payload is {} bytes",
                payload.len()
            )));
        }

        Ok(Self {
            dimension,
            metric,
            storage: Storage::from_le_bytes(precision, payload),
            fingerprint: Fingerprint::from_bytes(fingerprint),
        })
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn precision(&self) -> Precision {
        self.storage.precision()
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.storage.element_count() / self.dimension
        }
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            check_dimension(self.dimension, vector.len())?;
        }
        for vector in vectors {
            self.storage.extend(vector);
        }
        tracing::debug!("Added {} vectors, index now holds {}", vectors.len(), self.len());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        check_dimension(self.dimension, query.len())?;
        if k > MAX_SEARCH_K {
            return Err(RetrieverError::SearchLimit {
                requested: k,
                max: MAX_SEARCH_K,
            });
        }

        let mut scored: Vec<Neighbor> = (0..self.len())
            .map(|row| Neighbor {
                position: Some(row),
                score: self.storage.row_score(self.metric, query, row),
            })
            .collect();

        scored.sort_by(|a, b| {
            self.metric
                .compare(a.score, b.score)
                .then_with(|| a.position.cmp(&b.position))
        });
        scored.truncate(k);
        scored.resize(k, Neighbor::missing(self.metric));

        Ok(scored)
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.fingerprint = fingerprint;
    }

    fn to_bytes(&self) -> Vec<u8> {
        let payload = self.storage.le_bytes();
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.push(self.metric.to_byte());
        bytes.push(self.storage.precision().to_byte());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.fingerprint.as_bytes());
        bytes.extend_from_slice(&payload);
        bytes
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| RetrieverError::from_io(path, e))?;
        *self = Self::from_bytes(&bytes)?;
        tracing::debug!(
            "Loaded index with {} vectors ({}, {}) from {}",
            self.len(),
            self.metric,
            self.precision(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.6, 0.8, 0.0],
            vec![0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn test_inner_product_search_orders_best_first() {
        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        index.add(&sample_vectors()).unwrap();

        let neighbors = index.search(&[0.0, 1.0, 0.0], 3).unwrap();
        let positions: Vec<_> = neighbors.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![Some(1), Some(2), Some(0)]);
        assert_eq!(neighbors[0].score, 1.0);
        assert!((neighbors[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_search_orders_nearest_first() {
        let mut index = FlatIndex::new(3, Metric::L2, Precision::F32);
        index.add(&sample_vectors()).unwrap();

        let neighbors = index.search(&[0.0, 0.0, 1.0], 2).unwrap();
        assert_eq!(neighbors[0].position, Some(3));
        assert_eq!(neighbors[0].score, 0.0);
        assert!(neighbors[1].score >= neighbors[0].score);
    }

    #[test]
    fn test_ties_break_by_position() {
        let mut index = FlatIndex::new(2, Metric::InnerProduct, Precision::F32);
        index
            .add(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]])
            .unwrap();

        let neighbors = index.search(&[1.0, 0.0], 3).unwrap();
        let positions: Vec<_> = neighbors.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_search_pads_with_missing() {
        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        index.add(&sample_vectors()[..2]).unwrap();

        let neighbors = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(neighbors.len(), 5);
        assert!(neighbors[..2].iter().all(|n| n.position.is_some()));
        assert!(neighbors[2..].iter().all(|n| n.position.is_none()));
        assert_eq!(neighbors[4].score, f32::NEG_INFINITY);

        let empty = FlatIndex::new(3, Metric::L2, Precision::F32);
        let neighbors = empty.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(neighbors, vec![Neighbor::missing(Metric::L2); 2]);
    }

    #[test]
    fn test_search_rejects_unbounded_k() {
        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        index.add(&sample_vectors()).unwrap();

        for k in [MAX_SEARCH_K + 1, usize::MAX] {
            assert!(matches!(
                index.search(&[1.0, 0.0, 0.0], k),
                Err(RetrieverError::SearchLimit { max: MAX_SEARCH_K, .. })
            ));
        }
        assert_eq!(index.search(&[1.0, 0.0, 0.0], MAX_SEARCH_K).unwrap().len(), MAX_SEARCH_K);
    }

    #[test]
    fn test_fingerprint_survives_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stamped.sift");
        let stamp = blake3::hash(b"chunks");

        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        assert_eq!(index.fingerprint(), unstamped());
        index.add(&sample_vectors()).unwrap();
        index.set_fingerprint(stamp);
        index.save(&path).unwrap();

        assert_eq!(FlatIndex::open(&path).unwrap().fingerprint(), stamp);
    }

    #[test]
    fn test_add_rejects_wrong_dimension_atomically() {
        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        let err = index
            .add(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]])
            .unwrap_err();

        assert!(matches!(
            err,
            RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RetrieverError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_round_trip_both_precisions() {
        let dir = tempdir().unwrap();
        let vectors = vec![
            vec![0.123_456_7, -0.5, 0.333_333_3],
            vec![1e-3, 0.999, -0.25],
            vec![0.0, 0.0, 0.0],
        ];

        for (precision, metric) in [
            (Precision::F32, Metric::InnerProduct),
            (Precision::F16, Metric::L2),
        ] {
            let path = dir.path().join("nested").join(format!("{precision}.sift"));
            let mut index = FlatIndex::new(3, metric, precision);
            index.add(&vectors).unwrap();
            index.save(&path).unwrap();

            let loaded = FlatIndex::open(&path).unwrap();
            assert_eq!(loaded, index);
            assert_eq!(loaded.metric(), metric);
            assert_eq!(loaded.precision(), precision);

            let query = [0.1, 0.2, 0.3];
            assert_eq!(
                loaded.search(&query, 3).unwrap(),
                index.search(&query, 3).unwrap()
            );
        }
    }

    #[test]
    fn test_f16_stores_approximate_values() {
        let mut index = FlatIndex::new(2, Metric::InnerProduct, Precision::F16);
        index.add(&[vec![0.1, 0.7]]).unwrap();

        let stored = index.vector(0).unwrap();
        assert!((stored[0] - 0.1).abs() < 1e-3);
        assert!((stored[1] - 0.7).abs() < 1e-3);
        assert_eq!(index.vector(1), None);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = FlatIndex::open(&dir.path().join("absent.sift")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_rejects_corrupt_files() {
        let dir = tempdir().unwrap();

        let path = dir.path().join("garbage.sift");
        std::fs::write(&path, b"not an index at all, definitely not").unwrap();
        assert!(matches!(
            FlatIndex::open(&path),
            Err(RetrieverError::CorruptIndex(_))
        ));

        let path = dir.path().join("short.sift");
        std::fs::write(&path, b"SIFT").unwrap();
        assert!(matches!(
            FlatIndex::open(&path),
            Err(RetrieverError::CorruptIndex(_))
        ));

        // Valid header, payload cut short.
        let mut index = FlatIndex::new(3, Metric::InnerProduct, Precision::F32);
        index.add(&sample_vectors()).unwrap();
        let mut bytes = index.to_bytes();
        bytes.truncate(bytes.len() - 4);
        let path = dir.path().join("truncated.sift");
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            FlatIndex::open(&path),
            Err(RetrieverError::CorruptIndex(_))
        ));
    }
}
