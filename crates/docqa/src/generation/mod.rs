//! Answer synthesis over retrieved chunks

pub mod engine;
pub mod prompt;
pub mod summarize;

pub use engine::QueryEngine;
pub use prompt::PromptBuilder;
pub use summarize::TreeSummarizer;
