//! Flat cosine-similarity index persisted as a single JSON file

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, ScoredChunk};

/// On-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// A chunk with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Indexed chunk
    pub chunk: Chunk,
    /// Embedding of the chunk content
    pub embedding: Vec<f32>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: u32,
    dimensions: Option<usize>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    version: u32,
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// In-memory list of entries scored by brute force
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedding dimension, fixed by the first entry
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Distinct document ids in first-insertion order
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !ids.contains(&entry.chunk.document_id) {
                ids.push(entry.chunk.document_id.clone());
            }
        }
        ids
    }

    /// Number of chunks indexed for a document
    pub fn chunk_count_for(&self, document_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.chunk.document_id == document_id)
            .count()
    }

    fn check_dimensions(&self, actual: usize) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != actual => {
                Err(Error::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Append an entry
    pub fn push(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::embedding("provider returned an empty vector"));
        }
        self.check_dimensions(embedding.len())?;
        self.dimensions = Some(embedding.len());
        self.entries.push(IndexEntry { chunk, embedding });
        Ok(())
    }

    /// Top `k` entries by cosine similarity, best first.
    ///
    /// Ties keep insertion order.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidRequest("k must be at least 1".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimensions(query.len())?;

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score: score as f32,
            })
            .collect())
    }

    /// Write the index to `path` atomically.
    ///
    /// On failure the previous file, if any, is left as it was.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| write_failed(path, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_failed(path, e))?;
        let file = IndexFileRef {
            version: INDEX_FORMAT_VERSION,
            dimensions: self.dimensions,
            entries: &self.entries,
        };
        serde_json::to_writer(&mut tmp, &file).map_err(|e| write_failed(path, e))?;
        tmp.flush().map_err(|e| write_failed(path, e))?;
        tmp.as_file().sync_all().map_err(|e| write_failed(path, e))?;
        tmp.persist(path).map_err(|e| write_failed(path, e.error))?;

        tracing::debug!(path = %path.display(), entries = self.entries.len(), "Index persisted");
        Ok(())
    }

    /// Load an index. A missing file is an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No index file, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(Error::corrupt_index(path, e.to_string())),
        };

        let file: IndexFile =
            serde_json::from_slice(&raw).map_err(|e| Error::corrupt_index(path, e.to_string()))?;
        if file.version != INDEX_FORMAT_VERSION {
            return Err(Error::corrupt_index(
                path,
                format!("unsupported format version {}", file.version),
            ));
        }

        let dimensions = match (file.dimensions, file.entries.first()) {
            (Some(d), _) => Some(d),
            (None, Some(first)) => Some(first.embedding.len()),
            (None, None) => None,
        };
        if let Some(expected) = dimensions {
            if let Some(bad) = file.entries.iter().find(|e| e.embedding.len() != expected) {
                return Err(Error::corrupt_index(
                    path,
                    format!(
                        "entry {} has {} dimensions, expected {}",
                        bad.chunk.id,
                        bad.embedding.len(),
                        expected
                    ),
                ));
            }
        }

        tracing::info!(
            path = %path.display(),
            entries = file.entries.len(),
            "Loaded vector index"
        );
        Ok(Self {
            dimensions,
            entries: file.entries,
        })
    }
}

fn write_failed(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::IndexWriteFailed(format!("{}: {}", path.display(), err))
}

/// Cosine similarity accumulated sequentially in f64. Zero-magnitude vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(doc: &str, content: &str) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id: doc.to_string(),
            ingest_id: Uuid::nil(),
            content: content.to_string(),
            chunk_index: 0,
            token_start: 0,
            token_end: 1,
        }
    }

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.push(chunk("a.txt", "east"), vec![1.0, 0.0]).unwrap();
        index.push(chunk("b.txt", "north"), vec![0.0, 1.0]).unwrap();
        index.push(chunk("c.txt", "northeast"), vec![1.0, 1.0]).unwrap();
        index
    }

    #[test]
    fn test_retrieve_orders_by_similarity() {
        let index = sample();
        let hits = index.retrieve(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "east");
        assert_eq!(hits[1].chunk.content, "northeast");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_retrieve_k_larger_than_index() {
        let index = sample();
        assert_eq!(index.retrieve(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_retrieve_zero_k_is_rejected() {
        let index = sample();
        assert!(matches!(
            index.retrieve(&[1.0, 0.0], 0),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index.push(chunk("first", "x"), vec![2.0, 0.0]).unwrap();
        index.push(chunk("second", "y"), vec![1.0, 0.0]).unwrap();
        let hits = index.retrieve(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.document_id, "first");
        assert_eq!(hits[1].chunk.document_id, "second");
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = sample();
        assert!(matches!(
            index.push(chunk("d", "bad"), vec![1.0, 0.0, 0.0]),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            index.retrieve(&[1.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");
        let index = sample();
        index.persist(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimensions(), Some(2));
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.document_ids(), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = VectorIndex::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimensions(), None);
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            VectorIndex::load(&path),
            Err(Error::CorruptIndex { .. })
        ));

        std::fs::write(&path, r#"{"version":99,"dimensions":null,"entries":[]}"#).unwrap();
        assert!(matches!(
            VectorIndex::load(&path),
            Err(Error::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_persist_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("index.json");
        assert!(matches!(
            sample().persist(&path),
            Err(Error::IndexWriteFailed(_))
        ));
    }
}
