//! Prompt templates for answer synthesis and keyword extraction

/// Separator placed between context texts in one prompt
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Prompt builder
pub struct PromptBuilder;

impl PromptBuilder {
    /// Summarize a group of texts into an answer to `question`
    pub fn tree_summarize(question: &str, texts: &[String]) -> String {
        format!(
            "Context information from multiple sources is below.\n\
             ---------------------\n\
             {context}\n\
             ---------------------\n\
             Given the information from multiple sources and not prior knowledge, answer the query.\n\
             Query: {question}\n\
             Answer: ",
            context = texts.join(CONTEXT_SEPARATOR),
            question = question,
        )
    }

    /// Characters of a summarize prompt not taken by the context texts
    pub fn tree_summarize_overhead(question: &str) -> usize {
        Self::tree_summarize(question, &[]).chars().count()
    }

    /// Ask for the core keywords a correct answer must mention
    pub fn keyword_extraction(answer: &str) -> String {
        format!(
            "Extract the 2-5 most important keywords or key phrases from this answer.\n\
             These should be the core concepts that any correct answer must mention.\n\
             Return as comma-separated values, lowercase only.\n\n\
             Answer: {answer}\n\n\
             Keywords:",
            answer = answer,
        )
    }
}
