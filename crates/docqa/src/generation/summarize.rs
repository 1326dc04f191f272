//! Tree summarization over retrieved texts
//!
//! Texts are packed into prompts that fit the size budget. A single prompt is
//! answered directly; otherwise each prompt is answered and the partial
//! answers are summarized again, level by level, until one answer remains.

use futures::future::try_join_all;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{Capability, LlmProvider, RetryPolicy};
use crate::types::response::truncate_chars;

use super::prompt::{PromptBuilder, CONTEXT_SEPARATOR};

/// Smallest context budget per prompt, whatever the question length
const MIN_CONTEXT_CHARS: usize = 64;

/// Tree summarizer over a completion provider
pub struct TreeSummarizer {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    max_prompt_chars: usize,
}

impl TreeSummarizer {
    /// Create a summarizer with a per-prompt size budget in characters
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy, max_prompt_chars: usize) -> Self {
        Self {
            llm,
            retry,
            max_prompt_chars,
        }
    }

    /// The question as sent in prompts, cut so `MIN_CONTEXT_CHARS` of context still fit
    fn fit_question<'a>(&self, question: &'a str) -> std::borrow::Cow<'a, str> {
        let limit = self
            .max_prompt_chars
            .saturating_sub(PromptBuilder::tree_summarize_overhead("") + MIN_CONTEXT_CHARS);
        if question.chars().count() <= limit {
            return std::borrow::Cow::Borrowed(question);
        }
        tracing::warn!(limit, "Question longer than the prompt budget allows, truncating");
        std::borrow::Cow::Owned(truncate_chars(question, limit))
    }

    /// Characters available for context texts in one prompt
    fn context_budget(&self, question: &str) -> usize {
        self.max_prompt_chars
            .saturating_sub(PromptBuilder::tree_summarize_overhead(question))
            .max(MIN_CONTEXT_CHARS)
    }

    /// Greedily pack texts, in order, into groups that fit `budget`.
    /// A text larger than the budget is truncated and gets a group of its own.
    pub fn pack(texts: &[String], budget: usize) -> Vec<Vec<String>> {
        let separator = CONTEXT_SEPARATOR.chars().count();
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut used = 0usize;

        for text in texts {
            let text = truncate_chars(text, budget);
            let len = text.chars().count();
            let needed = if current.is_empty() { len } else { len + separator };

            if !current.is_empty() && used + needed > budget {
                groups.push(std::mem::take(&mut current));
                used = 0;
            }
            used += if current.is_empty() { len } else { len + separator };
            current.push(text);
        }
        if !current.is_empty() || groups.is_empty() {
            groups.push(current);
        }
        groups
    }

    /// Pair texts up, truncating each so a pair still fits `budget`
    fn pairwise(texts: &[String], budget: usize) -> Vec<Vec<String>> {
        let half = budget.saturating_sub(CONTEXT_SEPARATOR.chars().count()) / 2;
        texts
            .chunks(2)
            .map(|pair| pair.iter().map(|t| truncate_chars(t, half.max(1))).collect())
            .collect()
    }

    async fn complete(&self, question: &str, group: &[String]) -> Result<String> {
        let prompt = PromptBuilder::tree_summarize(question, group);
        let llm = Arc::clone(&self.llm);
        self.retry
            .run(Capability::Completion, || {
                let llm = Arc::clone(&llm);
                let prompt = prompt.as_str();
                async move { llm.complete(prompt).await }
            })
            .await
    }

    /// Produce one answer to `question` from `texts`
    pub async fn summarize(&self, question: &str, texts: Vec<String>) -> Result<String> {
        let question = self.fit_question(question);
        let question = question.as_ref();
        let budget = self.context_budget(question);
        let mut texts = texts;
        let mut level = 0usize;

        loop {
            let mut groups = Self::pack(&texts, budget);
            if groups.len() == 1 {
                let group = groups.pop().unwrap_or_default();
                tracing::debug!(level, texts = group.len(), "Final summarization");
                return self.complete(question, &group).await;
            }
            if groups.len() >= texts.len() {
                groups = Self::pairwise(&texts, budget);
            }

            level += 1;
            tracing::debug!(
                level,
                texts = texts.len(),
                groups = groups.len(),
                "Summarizing level"
            );
            texts = try_join_all(groups.iter().map(|group| self.complete(question, group))).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Answers with a running call count and records every prompt
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if self.fail {
                return Err(Error::completion("offline"));
            }
            let mut prompts = self.prompts.lock();
            prompts.push(prompt.to_string());
            Ok(format!("partial {}", prompts.len()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn summarizer(max_prompt_chars: usize, fail: bool) -> (TreeSummarizer, Arc<RecordingLlm>) {
        let llm = Arc::new(RecordingLlm {
            prompts: Mutex::new(Vec::new()),
            fail,
        });
        let retry = RetryPolicy::no_retry(Duration::from_secs(5));
        (TreeSummarizer::new(llm.clone(), retry, max_prompt_chars), llm)
    }

    fn texts(n: usize, len: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}", i).repeat(len)).collect()
    }

    #[test]
    fn test_pack_respects_budget() {
        let groups = TreeSummarizer::pack(&texts(5, 10), 25);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        for group in &groups {
            assert!(group.join(CONTEXT_SEPARATOR).chars().count() <= 25);
        }
    }

    #[test]
    fn test_pack_truncates_oversized_text() {
        let groups = TreeSummarizer::pack(&["x".repeat(100)], 30);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0].len(), 30);
    }

    #[test]
    fn test_pack_empty_yields_one_empty_group() {
        let groups = TreeSummarizer::pack(&[], 30);
        assert_eq!(groups, vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_single_prompt_when_everything_fits() {
        let (summarizer, llm) = summarizer(4_000, false);
        let answer = summarizer
            .summarize("q?", vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, "partial 1");
        assert_eq!(llm.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_small_budget_builds_multiple_levels() {
        let (summarizer, llm) = summarizer(400, false);
        let budget = summarizer.context_budget("q?");
        let answer = summarizer
            .summarize("q?", texts(6, budget / 2 + 1))
            .await
            .unwrap();

        let prompts = llm.prompts.lock();
        assert!(prompts.len() > 2);
        assert_eq!(answer, format!("partial {}", prompts.len()));
        assert!(prompts.iter().all(|p| p.chars().count() <= 400));
    }

    #[tokio::test]
    async fn test_long_question_stays_within_prompt_budget() {
        let (summarizer, llm) = summarizer(400, false);
        let question = "why ".repeat(500);
        summarizer
            .summarize(&question, texts(6, 90))
            .await
            .unwrap();

        let prompts = llm.prompts.lock();
        assert!(prompts.len() > 1);
        for prompt in prompts.iter() {
            assert!(prompt.chars().count() <= 400);
            assert!(prompt.contains("Query: why why"));
        }
    }

    #[test]
    fn test_short_question_is_untouched() {
        let (summarizer, _) = summarizer(400, false);
        assert_eq!(summarizer.fit_question("q?"), "q?");
    }

    #[test]
    fn test_pairs_fit_budget_in_chars() {
        let wide = vec!["é".repeat(50), "ü".repeat(50)];
        let groups = TreeSummarizer::pairwise(&wide, 40);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].join(CONTEXT_SEPARATOR).chars().count() <= 40);
        assert_eq!(groups[0][0].chars().count(), 19);
    }

    #[tokio::test]
    async fn test_completion_failure_surfaces() {
        let (summarizer, _) = summarizer(4_000, true);
        let err = summarizer
            .summarize("q?", vec!["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompletionUnavailable(_)));
    }
}
