//! Scoring answers against the labeled dataset

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::generation::QueryEngine;
use crate::types::response::truncate_chars;
use crate::types::sanitize_filename;

use super::dataset::{format_keywords, CsvSink, Dataset, EvalOutputRecord, EvalRecord, RowSink, RowStatus};

/// Incorrect answers listed in the summary
const INCORRECT_SAMPLES: usize = 5;

/// How the expected source is compared with retrieved document ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitPolicy {
    /// Case-insensitive equality of filenames
    #[default]
    Exact,
    /// Expected name contained in a retrieved id, case-insensitive
    Substring,
}

impl HitPolicy {
    /// Whether `expected` is among the retrieved document ids
    pub fn is_hit(&self, expected: &str, retrieved: &[&str]) -> bool {
        let expected = match self {
            HitPolicy::Exact => sanitize_filename(expected),
            HitPolicy::Substring => Some(expected.trim().to_string()),
        };
        let Some(expected) = expected.filter(|e| !e.is_empty()) else {
            return false;
        };
        let expected = expected.to_lowercase();

        retrieved.iter().any(|id| {
            let id = id.to_lowercase();
            match self {
                HitPolicy::Exact => id == expected,
                HitPolicy::Substring => id.contains(&expected),
            }
        })
    }
}

/// Fraction of keywords found in the answer, case-insensitively. No keywords scores 0.
pub fn keyword_match_ratio(answer: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let answer = answer.to_lowercase();
    let matched = keywords
        .iter()
        .filter(|k| answer.contains(&k.to_lowercase()))
        .count();
    matched as f64 / keywords.len() as f64
}

/// Cooperative cancellation for an evaluation run
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop after rows already in flight
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An incorrect answer kept for the summary
#[derive(Debug, Clone, Serialize)]
pub struct IncorrectSample {
    pub query: String,
    pub keywords: String,
    pub keyword_match_ratio: f64,
    pub retrieval_hit: bool,
}

/// Aggregate results of a run. Rates are percentages over evaluated rows.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    /// Rows in the dataset
    pub total: usize,
    /// Rows answered and scored
    pub evaluated: usize,
    /// Rows that failed and were left out of the rates
    pub excluded: usize,
    /// Whether the run was stopped before every row was processed
    pub stopped_early: bool,
    pub retrieval_hit_rate: f64,
    pub avg_keyword_match: f64,
    pub answer_correctness: f64,
    /// Ratio at or above which an answer counted as correct
    pub correctness_threshold: f64,
    /// First few incorrect answers, in dataset order
    pub incorrect: Vec<IncorrectSample>,
    pub finished_at: DateTime<Utc>,
}

impl AggregateReport {
    /// Human-readable summary
    pub fn render(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "=== RAG Evaluation Results ===");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Questions Evaluated:    {} of {}", self.evaluated, self.total);
        if self.excluded > 0 {
            let _ = writeln!(out, "Failed (excluded):      {}", self.excluded);
        }
        if self.stopped_early {
            let _ = writeln!(out, "Stopped early:          yes");
        }
        let _ = writeln!(out, "Retrieval Hit Rate:     {:.1}%", self.retrieval_hit_rate);
        let _ = writeln!(out, "Avg Keyword Match:      {:.1}%", self.avg_keyword_match);
        let _ = writeln!(
            out,
            "Answer Correctness:     {:.1}% (>={:.0}% keyword match)",
            self.answer_correctness,
            self.correctness_threshold * 100.0
        );
        let _ = writeln!(out, "{}", rule);

        if !self.incorrect.is_empty() {
            let _ = writeln!(
                out,
                "\n--- Sample Results (first {} incorrect answers) ---",
                self.incorrect.len()
            );
            for sample in &self.incorrect {
                let _ = writeln!(out, "\nQuery: {}...", truncate_chars(&sample.query, 80));
                let _ = writeln!(out, "Expected keywords: {}", sample.keywords);
                let _ = writeln!(out, "Keyword score: {:.3}", sample.keyword_match_ratio);
                let _ = writeln!(out, "Retrieval hit: {}", sample.retrieval_hit);
            }
        }
        out
    }
}

#[derive(Default)]
struct Tally {
    processed: usize,
    evaluated: usize,
    hits: usize,
    keyword_sum: f64,
    correct: usize,
    incorrect: Vec<IncorrectSample>,
}

impl Tally {
    fn add(&mut self, row: &EvalOutputRecord) {
        self.processed += 1;
        if row.status != RowStatus::Ok {
            return;
        }
        self.evaluated += 1;
        let hit = row.retrieval_hit.unwrap_or(false);
        let ratio = row.keyword_match_ratio.unwrap_or(0.0);
        self.hits += usize::from(hit);
        self.keyword_sum += ratio;
        if row.correct.unwrap_or(false) {
            self.correct += 1;
        } else if self.incorrect.len() < INCORRECT_SAMPLES {
            self.incorrect.push(IncorrectSample {
                query: row.query.clone(),
                keywords: row.keywords.clone(),
                keyword_match_ratio: ratio,
                retrieval_hit: hit,
            });
        }
    }

    fn percent(&self, value: f64) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            value / self.evaluated as f64 * 100.0
        }
    }

    fn report(self, total: usize, stopped_early: bool, threshold: f64) -> AggregateReport {
        AggregateReport {
            total,
            evaluated: self.evaluated,
            excluded: self.processed - self.evaluated,
            stopped_early,
            retrieval_hit_rate: self.percent(self.hits as f64),
            avg_keyword_match: self.percent(self.keyword_sum),
            answer_correctness: self.percent(self.correct as f64),
            correctness_threshold: threshold,
            incorrect: self.incorrect,
            finished_at: Utc::now(),
        }
    }
}

/// Runs the dataset through the query pipeline and scores every answer
pub struct Evaluator {
    engine: Arc<QueryEngine>,
    config: EvaluationConfig,
    stop: StopSignal,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(engine: Arc<QueryEngine>, config: EvaluationConfig) -> Self {
        Self {
            engine,
            config,
            stop: StopSignal::new(),
        }
    }

    /// Use an externally controlled stop signal
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Signal that stops this evaluator
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    async fn evaluate_row(&self, record: EvalRecord) -> EvalOutputRecord {
        let mut row = EvalOutputRecord {
            query_id: record.query_id.clone().unwrap_or_default(),
            query: record.query.clone(),
            expected_source: record.expected_source.clone(),
            keywords: format_keywords(&record.keywords),
            generated_answer: String::new(),
            retrieved_sources: String::new(),
            retrieval_hit: None,
            keyword_match_ratio: None,
            correct: None,
            status: RowStatus::Ok,
            error: String::new(),
        };

        let result = match self.engine.query(&record.query, self.config.top_k, true).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Query failed for '{}': {}", truncate_chars(&record.query, 80), e);
                row.status = RowStatus::Failed;
                row.error = e.to_string();
                return row;
            }
        };

        let retrieved = result.source_ids();
        let hit = self.config.hit_policy.is_hit(&record.expected_source, &retrieved);
        let ratio = keyword_match_ratio(&result.answer, &record.keywords);

        row.retrieved_sources = retrieved.join(", ");
        row.generated_answer = match self.config.max_answer_chars {
            Some(max) => truncate_chars(&result.answer, max),
            None => result.answer.clone(),
        };
        row.retrieval_hit = Some(hit);
        row.keyword_match_ratio = Some((ratio * 1000.0).round() / 1000.0);
        // No keywords means nothing to check the answer against
        row.correct =
            Some(!record.keywords.is_empty() && ratio >= self.config.correctness_threshold);
        row
    }

    /// Evaluate records in order, writing each row to `sink` as it completes
    pub async fn evaluate<S: RowSink>(&self, records: Vec<EvalRecord>, sink: &mut S) -> Result<AggregateReport> {
        let total = records.len();
        let stop = self.stop.clone();
        tracing::info!(
            "Evaluating {} questions (concurrency {})",
            total,
            self.config.concurrency
        );

        let mut rows = stream::iter(records)
            .take_while(move |_| futures::future::ready(!stop.is_stopped()))
            .map(|record| self.evaluate_row(record))
            .buffered(self.config.concurrency.max(1));

        let mut tally = Tally::default();
        while let Some(row) = rows.next().await {
            sink.write_row(&row)?;
            tally.add(&row);
        }

        let stopped_early = tally.processed < total;
        if stopped_early {
            tracing::warn!("Evaluation stopped after {} of {} rows", tally.processed, total);
        }
        Ok(tally.report(total, stopped_early, self.config.correctness_threshold))
    }

    /// Evaluate a dataset file into an output CSV
    pub async fn run_evaluation(&self, dataset_path: &Path, output_path: &Path) -> Result<AggregateReport> {
        self.run_evaluation_with(dataset_path, output_path, |_| {}).await
    }

    /// Like `run_evaluation`, calling `on_row` after each row is written
    pub async fn run_evaluation_with<F>(
        &self,
        dataset_path: &Path,
        output_path: &Path,
        on_row: F,
    ) -> Result<AggregateReport>
    where
        F: FnMut(&EvalOutputRecord),
    {
        let dataset = Dataset::load(dataset_path)?;
        if !dataset.has_keywords_column() {
            tracing::warn!(
                "{} has no keywords column; every keyword ratio will be 0",
                dataset_path.display()
            );
        }
        let mut sink = ObservedSink {
            inner: CsvSink::create(output_path)?,
            on_row,
        };
        let report = self.evaluate(dataset.into_records(), &mut sink).await?;
        tracing::info!("Results written to {}", output_path.display());
        Ok(report)
    }
}

/// Forwards rows to `inner`, then reports them to `on_row`
struct ObservedSink<S, F> {
    inner: S,
    on_row: F,
}

impl<S: RowSink, F: FnMut(&EvalOutputRecord)> RowSink for ObservedSink<S, F> {
    fn write_row(&mut self, row: &EvalOutputRecord) -> Result<()> {
        self.inner.write_row(row)?;
        (self.on_row)(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_keyword_ratio() {
        let answer = "Mitochondria produce ATP for the cell.";
        assert_eq!(keyword_match_ratio(answer, &kw(&["atp", "mitochondria"])), 1.0);
        assert_eq!(keyword_match_ratio(answer, &kw(&["atp", "nucleus"])), 0.5);
        assert_eq!(keyword_match_ratio(answer, &[]), 0.0);
    }

    #[test]
    fn test_exact_hit_policy() {
        let policy = HitPolicy::Exact;
        assert!(policy.is_hit("Report.PDF", &["a.txt", "report.pdf"]));
        assert!(policy.is_hit("docs/report.pdf", &["report.pdf"]));
        assert!(!policy.is_hit("report.pdf", &["old_report.pdf"]));
        assert!(!policy.is_hit("", &["report.pdf"]));
        assert!(!policy.is_hit("report.pdf", &[]));
    }

    #[test]
    fn test_substring_hit_policy() {
        let policy = HitPolicy::Substring;
        assert!(policy.is_hit("report", &["old_report.pdf"]));
        assert!(!policy.is_hit("", &["report.pdf"]));
    }

    #[test]
    fn test_report_rates_over_evaluated_rows() {
        let mut tally = Tally::default();
        let row = |status, hit, ratio, correct| EvalOutputRecord {
            query_id: String::new(),
            query: "q".to_string(),
            expected_source: "a.pdf".to_string(),
            keywords: "k".to_string(),
            generated_answer: String::new(),
            retrieved_sources: String::new(),
            retrieval_hit: hit,
            keyword_match_ratio: ratio,
            correct,
            status,
            error: String::new(),
        };
        tally.add(&row(RowStatus::Ok, Some(true), Some(1.0), Some(true)));
        tally.add(&row(RowStatus::Ok, Some(false), Some(0.0), Some(false)));
        tally.add(&row(RowStatus::Failed, None, None, None));

        let report = tally.report(4, true, 0.5);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.retrieval_hit_rate, 50.0);
        assert_eq!(report.avg_keyword_match, 50.0);
        assert_eq!(report.answer_correctness, 50.0);
        assert_eq!(report.incorrect.len(), 1);
        assert!(report.render().contains("Retrieval Hit Rate:     50.0%"));
    }

    #[test]
    fn test_empty_report_is_zero() {
        let report = Tally::default().report(0, false, 0.5);
        assert_eq!(report.retrieval_hit_rate, 0.0);
        assert_eq!(report.answer_correctness, 0.0);
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        clone.stop();
        assert!(signal.is_stopped());
    }
}
