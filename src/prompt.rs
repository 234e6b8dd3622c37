//! Prompt assembly.
//!
//! The template is what keeps the model grounded: it tells the model to
//! answer only from the supplied context. [`PromptTemplate::default`] is
//! the grounding template used by the pipeline.

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Separator placed between chunk contents in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "
You are a helpful AI assistant. Answer ONLY using the information from the context.

Context:
{context}

Question:
{question}
";

/// An instruction template with `{context}` and `{question}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Fails unless the template contains both `{context}` and `{question}`.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(RagError::Configuration(format!(
                    "prompt template is missing the {} placeholder",
                    slot
                )));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render the prompt from chunks in rank order.
    ///
    /// Chunk contents are joined with a blank line. An empty question is a
    /// configuration error; an empty chunk list renders an empty context.
    pub fn assemble(&self, chunks: &[Chunk], question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::Configuration("question is empty".to_string()));
        }
        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        Ok(self.render(&context, question))
    }

    /// Substitute the slots in a single left-to-right pass, so placeholder
    /// text inside the context or question is never expanded again.
    fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Render `question` and `chunks` with the default grounding template.
pub fn assemble(chunks: &[Chunk], question: &str) -> Result<String> {
    PromptTemplate::default().assemble(chunks, question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: content.to_string(),
            content: content.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_contains_question_and_every_chunk() {
        let chunks = vec![
            chunk("Refunds are issued within 30 days."),
            chunk("Shipping is free over $50.\nExpress costs extra."),
        ];
        let question = "How long do refunds take?";
        let prompt = assemble(&chunks, question).unwrap();
        assert!(prompt.contains(question));
        for c in &chunks {
            assert!(prompt.contains(&c.content));
        }
        assert!(prompt.contains("Answer ONLY using the information from the context."));
    }

    #[test]
    fn test_context_in_rank_order_with_blank_line() {
        let prompt = assemble(&[chunk("first"), chunk("second")], "q?").unwrap();
        assert!(prompt.contains("Context:\nfirst\n\nsecond\n\nQuestion:\nq?\n"));
    }

    #[test]
    fn test_placeholders_in_content_not_expanded() {
        let prompt = assemble(&[chunk("literal {question} in a document")], "real?").unwrap();
        assert!(prompt.contains("literal {question} in a document"));
        assert_eq!(prompt.matches("real?").count(), 1);
    }

    #[test]
    fn test_empty_context_still_renders() {
        let prompt = assemble(&[], "anything?").unwrap();
        assert!(prompt.contains("Context:\n\n\nQuestion:\nanything?"));
    }

    #[test]
    fn test_empty_question_rejected() {
        assert!(matches!(
            assemble(&[chunk("x")], "   "),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_custom_template_requires_both_slots() {
        assert!(PromptTemplate::new("only {context}").is_err());
        let t = PromptTemplate::new("Q: {question} | C: {context} | {other}").unwrap();
        let out = t.assemble(&[chunk("a"), chunk("b")], "why").unwrap();
        assert_eq!(out, "Q: why | C: a\n\nb | {other}");
    }
}
