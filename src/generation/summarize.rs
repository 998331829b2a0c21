//! Map-reduce summarization over a session's full chunk set
//!
//! A single top-K retrieval cannot cover a document larger than the
//! context budget, so the summarizer batches every chunk under the budget,
//! summarizes each batch, then folds the partial summaries into one.

use crate::error::Result;
use crate::providers::LlmProvider;

use super::prompt::PromptBuilder;

/// Whole-document summarizer
pub struct Summarizer<'a> {
    llm: &'a dyn LlmProvider,
    /// Maximum characters of document text per map batch
    context_budget: usize,
}

impl<'a> Summarizer<'a> {
    /// Create a summarizer over the given model
    pub fn new(llm: &'a dyn LlmProvider, context_budget: usize) -> Self {
        Self {
            llm,
            context_budget: context_budget.max(1),
        }
    }

    /// Summarize chunk texts given in document order.
    ///
    /// Returns the summary and the number of map batches used. A document
    /// that fits one batch skips the reduce step entirely.
    pub async fn summarize(&self, chunk_texts: &[String]) -> Result<(String, usize)> {
        let batches = self.batch(chunk_texts);
        let batch_count = batches.len();

        tracing::debug!(
            chunks = chunk_texts.len(),
            batches = batch_count,
            "summarizing document"
        );

        let mut partials = Vec::with_capacity(batch_count);
        for batch in &batches {
            let prompt = PromptBuilder::build_summary_prompt(batch);
            partials.push(self.llm.generate(&prompt).await?);
        }

        if partials.len() == 1 {
            let summary = partials
                .pop()
                .unwrap_or_default();
            return Ok((summary, batch_count));
        }

        let reduce_prompt = PromptBuilder::build_reduce_prompt(&partials);
        let summary = self.llm.generate(&reduce_prompt).await?;

        Ok((summary, batch_count))
    }

    /// Greedily pack chunk texts into batches under the context budget.
    ///
    /// A single chunk larger than the budget forms its own batch rather
    /// than being dropped.
    fn batch(&self, chunk_texts: &[String]) -> Vec<String> {
        let mut batches = Vec::new();
        let mut current = String::new();

        for text in chunk_texts {
            if !current.is_empty() && current.len() + text.len() + 2 > self.context_budget {
                batches.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(text);
        }
        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake model that counts map and reduce calls
    struct CountingLlm {
        map_calls: AtomicUsize,
        reduce_calls: AtomicUsize,
    }

    impl CountingLlm {
        fn new() -> Self {
            Self {
                map_calls: AtomicUsize::new(0),
                reduce_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CountingLlm {
        async fn generate(&self, prompt: &str) -> crate::error::Result<String> {
            if prompt.contains("summaries of consecutive parts") {
                self.reduce_calls.fetch_add(1, Ordering::SeqCst);
                Ok("final summary".to_string())
            } else {
                let n = self.map_calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("partial {}", n))
            }
        }

        async fn health_check(&self) -> crate::error::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_small_document_skips_reduce() {
        let llm = CountingLlm::new();
        let summarizer = Summarizer::new(&llm, 1000);
        let chunks = vec!["short text".to_string()];

        let (summary, batches) = summarizer.summarize(&chunks).await.unwrap();

        assert_eq!(batches, 1);
        assert_eq!(summary, "partial 0");
        assert_eq!(llm.map_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.reduce_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_five_batches_reduce_exactly_once() {
        let llm = CountingLlm::new();
        // Budget fits one chunk per batch
        let summarizer = Summarizer::new(&llm, 120);
        let chunks: Vec<String> = (0..5).map(|i| format!("{}", i).repeat(100)).collect();

        let (summary, batches) = summarizer.summarize(&chunks).await.unwrap();

        assert_eq!(batches, 5);
        assert_eq!(llm.map_calls.load(Ordering::SeqCst), 5);
        assert_eq!(llm.reduce_calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary, "final summary");
    }

    #[tokio::test]
    async fn test_oversized_chunk_gets_its_own_batch() {
        let llm = CountingLlm::new();
        let summarizer = Summarizer::new(&llm, 50);
        let chunks = vec!["a".repeat(200), "b".repeat(10)];

        let (_, batches) = summarizer.summarize(&chunks).await.unwrap();
        assert_eq!(batches, 2);
    }

    /// Fake model that always fails
    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        async fn generate(&self, _prompt: &str) -> crate::error::Result<String> {
            Err(Error::generation("retries exhausted"))
        }

        async fn health_check(&self) -> crate::error::Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_generation_failure_is_surfaced() {
        let summarizer = Summarizer::new(&FailingLlm, 1000);
        let err = summarizer
            .summarize(&["text".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "generation_error");
    }
}
