//! Offline evaluation: keyword extraction and answer scoring

pub mod dataset;
pub mod evaluator;
pub mod keywords;

pub use dataset::{CsvSink, Dataset, EvalOutputRecord, EvalRecord, RowSink, RowStatus};
pub use evaluator::{keyword_match_ratio, AggregateReport, Evaluator, HitPolicy, StopSignal};
pub use keywords::{normalize_keywords, ExtractionSummary, KeywordExtractor};
