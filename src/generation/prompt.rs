//! Prompt templates and context assembly

use crate::index::SearchHit;

/// Prompt builder for grounded question answering and summarization
pub struct PromptBuilder;

impl PromptBuilder {
    /// Assemble a context string from ranked hits under a byte budget.
    ///
    /// Hits are taken in rank order; once the next entry would exceed the
    /// budget, it and everything below it are dropped. Returns the context
    /// and the hits that actually made it in.
    pub fn assemble_context(hits: &[SearchHit], budget: usize) -> (String, Vec<SearchHit>) {
        let mut context = String::new();
        let mut included = Vec::new();

        for (i, hit) in hits.iter().enumerate() {
            let entry = format!(
                "[{}] {}\n{}\n\n",
                i + 1,
                hit.locator.describe(),
                hit.text
            );

            if !context.is_empty() && context.len() + entry.len() > budget {
                break;
            }

            context.push_str(&entry);
            included.push(hit.clone());
        }

        (context, included)
    }

    /// Build the question-answering prompt with the fixed grounding
    /// instruction
    pub fn build_qa_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Answer the question using only the provided context. If the answer is not in the context, say that the document does not contain it; do not draw on outside knowledge.

CONTEXT:
{context}

QUESTION: {question}

ANSWER:"#,
            context = context,
            question = question
        )
    }

    /// Build a prompt summarizing one batch of document text
    pub fn build_summary_prompt(text: &str) -> String {
        format!(
            r#"Summarize the following document excerpt in clear, concise language, keeping the main points and key details:

{text}

Summary:"#,
            text = text
        )
    }

    /// Build the reduce prompt combining partial summaries into one
    pub fn build_reduce_prompt(partials: &[String]) -> String {
        let combined = partials
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Part {}:\n{}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"The following are summaries of consecutive parts of one document. Combine them into a single coherent summary of the whole document, highlighting the main points and key insights:

{combined}

Combined summary:"#,
            combined = combined
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Locator;

    fn hit(id: u32, text: &str) -> SearchHit {
        SearchHit {
            chunk_id: format!("{:05}", id),
            score: 1.0 - id as f32 * 0.1,
            text: text.to_string(),
            locator: Locator::default(),
        }
    }

    #[test]
    fn test_context_keeps_rank_order() {
        let hits = vec![hit(0, "first"), hit(1, "second")];
        let (context, included) = PromptBuilder::assemble_context(&hits, 10_000);

        assert_eq!(included.len(), 2);
        assert!(context.find("first").unwrap() < context.find("second").unwrap());
        assert!(context.starts_with("[1]"));
    }

    #[test]
    fn test_context_truncates_lowest_ranked_first() {
        let hits = vec![
            hit(0, &"a".repeat(100)),
            hit(1, &"b".repeat(100)),
            hit(2, &"c".repeat(100)),
        ];
        // Room for roughly one entry
        let (context, included) = PromptBuilder::assemble_context(&hits, 150);

        assert_eq!(included.len(), 1);
        assert_eq!(included[0].chunk_id, "00000");
        assert!(context.contains(&"a".repeat(100)));
        assert!(!context.contains('b'));
    }

    #[test]
    fn test_top_hit_is_included_even_over_budget() {
        // A single oversized chunk still produces a usable context
        let hits = vec![hit(0, &"x".repeat(500))];
        let (_, included) = PromptBuilder::assemble_context(&hits, 100);
        assert_eq!(included.len(), 1);
    }

    #[test]
    fn test_qa_prompt_carries_question_and_context() {
        let prompt = PromptBuilder::build_qa_prompt("what color?", "The grass is green.");
        assert!(prompt.contains("what color?"));
        assert!(prompt.contains("The grass is green."));
        assert!(prompt.contains("only the provided context"));
    }

    #[test]
    fn test_reduce_prompt_numbers_partials() {
        let partials = vec!["one".to_string(), "two".to_string()];
        let prompt = PromptBuilder::build_reduce_prompt(&partials);
        assert!(prompt.contains("Part 1:\none"));
        assert!(prompt.contains("Part 2:\ntwo"));
    }
}
