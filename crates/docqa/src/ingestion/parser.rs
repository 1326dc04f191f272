//! Text extraction for staged uploads

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Upper bound on a single PDF extraction; some fonts make pdf-extract spin
const PDF_TIMEOUT: Duration = Duration::from_secs(60);

/// Text extracted from one file
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type the text was extracted as
    pub file_type: FileType,
    /// Extracted text content
    pub content: String,
}

/// Extracts text from supported file types
pub struct FileParser;

impl FileParser {
    /// Extract text from a file on disk. `filename` selects the format and labels errors.
    pub async fn parse_path(filename: &str, path: &Path) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename);
        if !file_type.is_supported() {
            return Err(Error::UnsupportedFormat(filename.to_string()));
        }

        match file_type {
            FileType::Txt | FileType::Markdown => {
                let data = tokio::fs::read(path)
                    .await
                    .map_err(|e| Error::file_parse(filename, e.to_string()))?;
                Ok(ParsedDocument {
                    file_type,
                    content: Self::parse_text(&data),
                })
            }
            FileType::Pdf => {
                let content = Self::parse_pdf(filename, path).await?;
                Ok(ParsedDocument { file_type, content })
            }
            FileType::Unknown => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }

    /// Decode text, replacing invalid UTF-8 sequences
    pub fn parse_text(data: &[u8]) -> String {
        let text = String::from_utf8_lossy(data);
        text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
    }

    #[cfg(feature = "pdf")]
    async fn parse_pdf(filename: &str, path: &Path) -> Result<String> {
        let owned = path.to_path_buf();
        let extracted =
            run_blocking(filename, PDF_TIMEOUT, move || pdf_extract::extract_text(&owned)).await?;

        match extracted {
            Ok(text) => Ok(cleanup_pdf_text(&text)),
            Err(e) => {
                tracing::warn!(filename, error = %e, "pdf-extract failed");
                Err(Error::file_parse(filename, e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "pdf"))]
    async fn parse_pdf(filename: &str, _path: &Path) -> Result<String> {
        Err(Error::UnsupportedFormat(filename.to_string()))
    }
}

/// Run a blocking extractor off the runtime. A panic or an overrun becomes
/// `FileParse` for `filename`; an overrunning thread is left to finish on its own.
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
async fn run_blocking<T, F>(filename: &str, limit: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::file_parse(
            filename,
            format!("extraction aborted: {}", e),
        )),
        Err(_) => {
            tracing::error!(filename, limit_secs = limit.as_secs(), "extraction timed out");
            Err(Error::file_parse(
                filename,
                format!("extraction timed out after {}s", limit.as_secs_f32()),
            ))
        }
    }
}

/// Normalize PDF output: drop NULs, expand ligatures, trim lines, remove blank runs
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
