//! One-time keyword extraction for the evaluation dataset

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{Capability, LlmProvider, RetryPolicy};

use super::dataset::{Dataset, EvalRecord};

/// Most keywords kept per answer
pub const MAX_KEYWORDS: usize = 5;
/// Fewest usable keywords for an extraction to count
pub const MIN_KEYWORDS: usize = 2;

/// Counts from a batch extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub total: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Remove a list marker such as `-`, `*`, `1.` or `2)` from the start of a term
fn strip_list_marker(term: &str) -> &str {
    let term = term.trim_start_matches(['-', '*', '•', '·']).trim_start();
    let digits = term.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &term[digits..];
        let mut chars = rest.chars();
        if matches!(chars.next(), Some('.') | Some(')')) {
            let after = chars.as_str();
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return after.trim_start();
            }
        }
    }
    term
}

/// Normalize a raw model reply into at most five distinct lowercase terms
pub fn normalize_keywords(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let raw = match raw.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("keywords:") => &raw[9..],
        _ => raw,
    };

    let mut keywords: Vec<String> = Vec::new();
    for piece in raw.split([',', '|', '\n']) {
        let term = strip_list_marker(piece.trim());
        let term = term.trim_matches(|c: char| matches!(c, '"' | '\'' | '`') || c.is_whitespace());
        let term = term
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if term.is_empty() || keywords.contains(&term) {
            continue;
        }
        keywords.push(term);
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// Extracts the keywords a correct answer must mention
pub struct KeywordExtractor {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl KeywordExtractor {
    /// Create an extractor
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Extract keywords from a reference answer
    pub async fn extract(&self, expected_answer: &str) -> Result<Vec<String>> {
        if expected_answer.trim().is_empty() {
            return Err(Error::ExtractionFailed("reference answer is empty".to_string()));
        }

        let prompt = PromptBuilder::keyword_extraction(expected_answer);
        let llm = Arc::clone(&self.llm);
        let reply = self
            .retry
            .run(Capability::Completion, || {
                let llm = Arc::clone(&llm);
                let prompt = prompt.as_str();
                async move { llm.complete(prompt).await }
            })
            .await?;

        let keywords = normalize_keywords(&reply);
        if keywords.len() < MIN_KEYWORDS {
            return Err(Error::ExtractionFailed(format!(
                "expected at least {} keywords, got {:?} from reply {:?}",
                MIN_KEYWORDS, keywords, reply
            )));
        }
        Ok(keywords)
    }

    /// Fill the keywords column of a dataset file in place.
    ///
    /// Rows that already carry keywords are left alone unless `overwrite`.
    /// A failed row is logged and keeps an empty keyword set.
    pub async fn extract_keywords_batch(&self, path: &Path, overwrite: bool) -> Result<ExtractionSummary> {
        self.extract_keywords_batch_with(path, overwrite, |_| {}).await
    }

    /// Like `extract_keywords_batch`, calling `on_row` after each row is handled
    pub async fn extract_keywords_batch_with<F>(
        &self,
        path: &Path,
        overwrite: bool,
        mut on_row: F,
    ) -> Result<ExtractionSummary>
    where
        F: FnMut(&EvalRecord),
    {
        let mut dataset = Dataset::load(path)?;
        let mut summary = ExtractionSummary {
            total: dataset.records().len(),
            ..ExtractionSummary::default()
        };
        tracing::info!("Extracting keywords for {} rows in {}", summary.total, path.display());

        for index in 0..summary.total {
            let record = dataset.records()[index].clone();
            if !overwrite && !record.keywords.is_empty() {
                summary.skipped += 1;
                on_row(&record);
                continue;
            }

            let keywords = match self.extract(&record.expected_answer).await {
                Ok(keywords) => {
                    summary.extracted += 1;
                    keywords
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        "Keyword extraction failed for {}: {}",
                        record.query_id.as_deref().unwrap_or(&record.query),
                        e
                    );
                    Vec::new()
                }
            };
            dataset.set_keywords(index, keywords);
            on_row(&dataset.records()[index]);
        }

        dataset.save(path)?;
        tracing::info!(
            "Keywords: {} extracted, {} skipped, {} failed",
            summary.extracted,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }
}
