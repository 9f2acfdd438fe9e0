//! Rewrite capability seam.
//!
//! The capability is an opaque async `text -> text` function supplied by
//! the caller: an HTTP model client in production, a scripted stub in
//! tests. It may fail or hang; the executor wraps every call in a timeout.

use async_trait::async_trait;

use crate::policy::{ModelTier, PromptStrictness};

/// Failure reported by a rewrite backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// External text-to-text repair function.
#[async_trait]
pub trait RewriteCapability: Send + Sync {
    /// Repair one chunk. Returning an empty string counts as a failure.
    async fn rewrite(
        &self,
        tier: &ModelTier,
        strictness: PromptStrictness,
        chunk: &str,
    ) -> Result<String, RewriteError>;
}

/// Instruction text for a strictness level.
pub fn system_prompt(strictness: PromptStrictness) -> &'static str {
    match strictness {
        PromptStrictness::Strict => {
            "You repair formatting artifacts in article text. Insert missing spaces between \
             merged words, rejoin sentence fragments split across paragraphs, delete bracketed \
             editorial notes and markdown markers, and remove repeated filler phrases. Do not \
             change any other wording. Keep every paragraph and the blank lines between them. \
             Return only the repaired text."
        }
        PromptStrictness::Medium => {
            "You repair formatting artifacts in article text: merged words, orphaned sentence \
             fragments, bracketed editorial notes, markdown markers and repeated filler phrases. \
             You may smooth the sentence around a repair, but keep the meaning, the facts and \
             the paragraph structure. Return only the repaired text."
        }
        PromptStrictness::Soft => {
            "Clean up this article text. Fix merged words and broken paragraphs, drop editorial \
             notes, markdown and filler phrases, and lightly reword where needed for flow. Keep \
             all facts and roughly the same length. Return only the cleaned text."
        }
    }
}
