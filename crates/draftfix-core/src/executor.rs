//! Restoration attempt executor.
//!
//! One attempt = chunk the text with the attempt's `chunk_max_chars`,
//! rewrite every chunk, reassemble, and accept the result only if the
//! length ratio clears `min_accept_ratio`. Acceptance is all-or-nothing: a
//! single failed chunk or a short reassembly rejects the whole attempt and
//! no partial text escapes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::chunker;
use crate::policy::RestorationAttemptConfig;
use crate::rewrite::RewriteCapability;

/// Why an attempt was rejected. Expected and routine: these drive
/// escalation and are never raised as errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptError {
    #[error("chunk {chunk} timed out after {timeout_ms} ms")]
    Timeout { chunk: usize, timeout_ms: u64 },

    #[error("chunk {chunk} failed: {message}")]
    Upstream { chunk: usize, message: String },

    #[error("chunk {chunk} returned an empty response")]
    EmptyResponse { chunk: usize },

    #[error("ratio below threshold")]
    RatioBelowThreshold { ratio: f64, min_accept_ratio: f64 },
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationOutcome {
    pub attempt_index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    /// `output_chars / input_chars`; 0.0 when no output was assembled.
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
    pub chunks: usize,
    pub elapsed_ms: u64,
}

/// Runs single attempts against a rewrite capability.
#[derive(Clone)]
pub struct AttemptExecutor {
    rewriter: Arc<dyn RewriteCapability>,
    chunk_concurrency: usize,
}

impl std::fmt::Debug for AttemptExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptExecutor")
            .field("chunk_concurrency", &self.chunk_concurrency)
            .finish_non_exhaustive()
    }
}

impl AttemptExecutor {
    /// `chunk_concurrency` caps in-flight rewrite calls within one attempt
    /// (0 is treated as 1).
    pub fn new(rewriter: Arc<dyn RewriteCapability>, chunk_concurrency: usize) -> Self {
        Self {
            rewriter,
            chunk_concurrency: chunk_concurrency.max(1),
        }
    }

    /// Execute one attempt over `text`. `text` is never modified.
    #[instrument(skip(self, text, config), fields(tier = %config.model_tier, strictness = %config.prompt_strictness))]
    pub async fn run_attempt(
        &self,
        attempt_index: usize,
        text: &str,
        config: &RestorationAttemptConfig,
    ) -> RestorationOutcome {
        let started = Instant::now();
        let chunks = chunker::split(text, config.chunk_max_chars);
        let chunk_count = chunks.len();
        let timeout = Duration::from_millis(config.timeout_ms);

        let failed = |error: AttemptError| RestorationOutcome {
            attempt_index,
            success: false,
            result_text: None,
            ratio: 0.0,
            error: Some(error),
            chunks: chunk_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        // Whitespace-only chunks (such as the tail after a trailing
        // separator) pass through without a rewrite call.
        let mut repaired: Vec<Option<String>> = vec![None; chunk_count];
        let mut pending = Vec::new();
        for (i, chunk) in chunks.into_iter().enumerate() {
            if chunk.trim().is_empty() {
                repaired[i] = Some(chunk);
            } else {
                pending.push((i, chunk));
            }
        }

        let calls = pending.into_iter().map(|(i, chunk)| {
            let rewriter = Arc::clone(&self.rewriter);
            let tier = config.model_tier.clone();
            let strictness = config.prompt_strictness;
            async move {
                let result =
                    tokio::time::timeout(timeout, rewriter.rewrite(&tier, strictness, &chunk)).await;
                (i, chunk, result)
            }
        });
        let mut in_flight = stream::iter(calls).buffer_unordered(self.chunk_concurrency);

        while let Some((i, chunk, result)) = in_flight.next().await {
            // Returning drops `in_flight`, which cancels the remaining calls.
            match result {
                Err(_elapsed) => {
                    return failed(AttemptError::Timeout {
                        chunk: i,
                        timeout_ms: config.timeout_ms,
                    })
                }
                Ok(Err(e)) => {
                    return failed(AttemptError::Upstream {
                        chunk: i,
                        message: e.to_string(),
                    })
                }
                Ok(Ok(out)) if out.trim().is_empty() => {
                    return failed(AttemptError::EmptyResponse { chunk: i })
                }
                Ok(Ok(out)) => {
                    debug!(chunk = i, chars = out.chars().count(), "chunk rewritten");
                    repaired[i] = Some(restore_edges(&chunk, out.trim()));
                }
            }
        }
        drop(in_flight);

        let repaired: Vec<String> = repaired.into_iter().flatten().collect();
        let reassembled = chunker::merge(&repaired);
        let ratio = length_ratio(text, &reassembled);

        if ratio < config.min_accept_ratio {
            let mut outcome = failed(AttemptError::RatioBelowThreshold {
                ratio,
                min_accept_ratio: config.min_accept_ratio,
            });
            outcome.ratio = ratio;
            return outcome;
        }

        RestorationOutcome {
            attempt_index,
            success: true,
            result_text: Some(reassembled),
            ratio,
            error: None,
            chunks: chunk_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Re-attach the original chunk's leading and trailing whitespace to the
/// trimmed rewrite, so extra newlines kept by the chunker survive.
fn restore_edges(original: &str, core: &str) -> String {
    let body = original.trim();
    if body.is_empty() {
        return original.to_string();
    }
    let lead = original.len() - original.trim_start().len();
    let trail_start = lead + body.len();
    format!("{}{}{}", &original[..lead], core, &original[trail_start..])
}

/// `output_chars / input_chars`, 1.0 for empty input.
pub fn length_ratio(input: &str, output: &str) -> f64 {
    let input_chars = input.chars().count();
    if input_chars == 0 {
        return 1.0;
    }
    output.chars().count() as f64 / input_chars as f64
}
