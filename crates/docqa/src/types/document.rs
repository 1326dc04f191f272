//! Document and chunk types with provenance for source attribution

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// PDF document
    Pdf,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Self {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this build can extract text from the type
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Txt | Self::Markdown => true,
            Self::Pdf => cfg!(feature = "pdf"),
            Self::Unknown => false,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Txt => "Text File",
            Self::Markdown => "Markdown",
            Self::Pdf => "PDF",
            Self::Unknown => "Unknown",
        }
    }
}

/// A document accepted for ingestion.
///
/// The filename is the document identity; `ingest_id` tells apart repeated
/// uploads under the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Sanitized original filename
    pub id: String,
    /// Identifier of this ingestion
    pub ingest_id: Uuid,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the uploaded bytes, hex encoded
    pub content_hash: String,
    /// Upload size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record for an upload
    pub fn new(id: String, file_type: FileType, content_hash: String, file_size: u64) -> Self {
        Self {
            id,
            ingest_id: Uuid::new_v4(),
            file_type,
            content_hash,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// A contiguous token window of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Owning document (filename)
    pub document_id: String,
    /// Ingestion that produced the chunk
    pub ingest_id: Uuid,
    /// Text content
    pub content: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// First token of the window
    pub token_start: usize,
    /// One past the last token of the window
    pub token_end: usize,
}

impl Chunk {
    /// Number of tokens covered by the chunk
    pub fn token_len(&self) -> usize {
        self.token_end - self.token_start
    }
}

/// A chunk paired with its similarity to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is better)
    pub score: f32,
}

/// Reduce an uploaded name to its final path component.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("notes.TXT"), FileType::Txt);
        assert_eq!(FileType::from_filename("README.md"), FileType::Markdown);
        assert_eq!(FileType::from_filename("paper.pdf"), FileType::Pdf);
        assert_eq!(FileType::from_filename("archive.zip"), FileType::Unknown);
        assert_eq!(FileType::from_filename("no_extension"), FileType::Unknown);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b/report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_filename("C:\\docs\\x.txt").as_deref(), Some("x.txt"));
        assert_eq!(sanitize_filename("  plain.txt ").as_deref(), Some("plain.txt"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename(""), None);
    }
}
