//! Answer-generation seam.
//!
//! Retrieval ends at a list of [`FormattedResult`]s. Turning them into an
//! answer is the job of a language model that lives outside this crate; it
//! plugs in through [`AnswerGenerator`], usually by sending the
//! [`build_prompt`] messages to a chat model. [`ExtractiveGenerator`] is the
//! built-in stand-in: it answers with the best passage verbatim.

use super::FormattedResult;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produce an answer to `query` grounded in `context` (best first, non-empty).
    async fn generate(&self, query: &str, context: &[FormattedResult]) -> Result<String>;
}

/// Passages joined by blank lines, best first. This is the context block a
/// model prompt is built around.
pub fn format_context(results: &[FormattedResult]) -> String {
    results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A two-message chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[system]\n{}\n\n[user]\n{}", self.system, self.user)
    }
}

/// System instructions plus a user message carrying the retrieved context
/// and the question.
pub fn build_prompt(query: &str, results: &[FormattedResult], system_prompt: &str) -> Prompt {
    Prompt {
        system: system_prompt.trim().to_string(),
        user: format!(
            "Here is information from internal sources:\n\n{}\n\nCustomer question: {}\nAnswer:",
            format_context(results),
            query.trim()
        ),
    }
}

/// Append a link to the best result's source.
pub fn append_source_link(answer: &str, results: &[FormattedResult], label: &str) -> String {
    match results.first().map(|r| r.source_url.as_str()) {
        Some(url) if !url.is_empty() => format!("{answer}\n\n{label} {url}"),
        _ => answer.to_string(),
    }
}

/// Answers with the highest-ranked passage.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveGenerator {
    source_label: String,
}

impl ExtractiveGenerator {
    pub fn new(source_label: impl Into<String>) -> Self {
        Self {
            source_label: source_label.into(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(&self, _query: &str, context: &[FormattedResult]) -> Result<String> {
        let answer = context.first().map(|r| r.text.as_str()).unwrap_or_default();
        if self.source_label.is_empty() {
            return Ok(answer.to_string());
        }
        Ok(append_source_link(answer, context, &self.source_label))
    }
}
