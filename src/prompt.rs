//! Grounding prompt construction.
//!
//! [`PromptAssembler::assemble`] is a pure function of the question, the
//! documents (in the order given) and the truncation setting. The output
//! layout is fixed:
//!
//! ```text
//! Use the following documents to answer the user's question.
//! Each passage has a NAME which is the title of the document. After your answer, ...
//!
//! ---
//! NAME: <name>
//! DOCUMENT:
//! <content>
//! ---
//!
//! Question: <question>
//! Response:
//! ```

use crate::config::PromptConfig;
use crate::models::{Document, RankedHit};

const PREAMBLE: &str = "Use the following documents to answer the user's question.\n";

const CITATION_INSTRUCTIONS: &str = "Each passage has a NAME which is the title of the document. \
After your answer, leave a blank line and then give the source name of the passages you answered from. \
Put them in a comma separated list, prefixed with SOURCES:.\n\n";

#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    max_document_chars: Option<usize>,
}

impl PromptAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            max_document_chars: config.max_document_chars,
        }
    }

    /// Build the grounding prompt. Never re-orders `documents`.
    pub fn assemble(&self, question: &str, documents: &[RankedHit]) -> String {
        let mut prompt = String::with_capacity(
            PREAMBLE.len()
                + CITATION_INSTRUCTIONS.len()
                + documents
                    .iter()
                    .map(|d| d.document.content.len() + 32)
                    .sum::<usize>()
                + question.len()
                + 24,
        );
        prompt.push_str(PREAMBLE);
        prompt.push_str(CITATION_INSTRUCTIONS);
        for hit in documents {
            self.push_document(&mut prompt, &hit.document);
        }
        prompt.push_str("Question: ");
        prompt.push_str(question);
        prompt.push_str("\nResponse:");
        prompt
    }

    fn push_document(&self, prompt: &mut String, doc: &Document) {
        prompt.push_str("---\nNAME: ");
        prompt.push_str(doc.name.as_deref().unwrap_or(""));
        prompt.push_str("\nDOCUMENT:\n");
        prompt.push_str(truncate_chars(&doc.content, self.max_document_chars));
        prompt.push_str("\n---\n\n");
    }
}

/// Cut `text` to at most `limit` characters, on a char boundary.
pub fn truncate_chars(text: &str, limit: Option<usize>) -> &str {
    match limit {
        Some(n) => match text.char_indices().nth(n) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        },
        None => text,
    }
}
