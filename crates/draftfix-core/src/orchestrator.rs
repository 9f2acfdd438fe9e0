//! Escalation orchestrator.
//!
//! Walks the attempt policy table in order, strongest entry first, and stops
//! at the first accepted attempt. Attempts are strictly sequential: later
//! entries exist only as fallback for earlier failures, so racing them
//! would only waste rewrite calls.
//!
//! Exhausting the table is not an error. The result carries the verbatim
//! original with `used_fallback = true`, so restoration failure always
//! degrades to the input and never to data loss.
//!
//! ```text
//! attempt 0 (premium, strict, ratio ≥ 0.90)
//!     │ rejected
//!     ▼
//! attempt 1 … attempt N-1 (cheaper, looser, lower floor)
//!     │ all rejected
//!     ▼
//! fallback: original text
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::analyzer::{IssueAnalyzer, IssueReport};
use crate::executor::{AttemptExecutor, RestorationOutcome};
use crate::policy::AttemptPolicyTable;

/// Cooperative cancellation, observed only between attempts.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Raises the paired [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A linked handle/signal pair.
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        CancelSignal { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// What the orchestrator produced for one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationResult {
    /// Accepted restoration, or the original byte-for-byte.
    pub final_text: String,
    /// One entry per attempt actually run, in table order.
    pub outcomes: Vec<RestorationOutcome>,
    /// The table ran (or was cut short) without an accepted attempt.
    pub used_fallback: bool,
    /// Analysis found nothing to repair; no attempt ran.
    pub skipped: bool,
    /// Cancellation was observed before the table finished.
    pub cancelled: bool,
}

impl RestorationResult {
    fn unchanged(text: &str, outcomes: Vec<RestorationOutcome>) -> Self {
        Self {
            final_text: text.to_string(),
            outcomes,
            used_fallback: true,
            skipped: false,
            cancelled: false,
        }
    }

    /// Index of the accepted attempt, if any.
    pub fn accepted_attempt(&self) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|o| o.success)
            .map(|o| o.attempt_index)
    }
}

/// Drives an [`AttemptPolicyTable`] through an [`AttemptExecutor`].
#[derive(Debug, Clone)]
pub struct EscalationOrchestrator {
    policy: Arc<AttemptPolicyTable>,
    executor: AttemptExecutor,
    analyzer: Arc<IssueAnalyzer>,
}

impl EscalationOrchestrator {
    pub fn new(
        policy: Arc<AttemptPolicyTable>,
        executor: AttemptExecutor,
        analyzer: Arc<IssueAnalyzer>,
    ) -> Self {
        Self {
            policy,
            executor,
            analyzer,
        }
    }

    pub fn policy(&self) -> &AttemptPolicyTable {
        &self.policy
    }

    /// Run the table over `text` until an attempt is accepted.
    #[instrument(skip_all, fields(chars = text.chars().count(), attempts = self.policy.len()))]
    pub async fn restore(&self, text: &str, cancel: &CancelSignal) -> RestorationResult {
        let mut outcomes = Vec::with_capacity(self.policy.len());

        for (index, config) in self.policy.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(attempt = index, "restoration cancelled between attempts");
                let mut result = RestorationResult::unchanged(text, outcomes);
                result.cancelled = true;
                return result;
            }

            let outcome = self.executor.run_attempt(index, text, config).await;

            if outcome.success {
                info!(attempt = index, ratio = outcome.ratio, "restoration accepted");
                let final_text = outcome.result_text.clone().unwrap_or_else(|| text.to_string());
                outcomes.push(outcome);
                return RestorationResult {
                    final_text,
                    outcomes,
                    used_fallback: false,
                    skipped: false,
                    cancelled: false,
                };
            }

            debug!(
                attempt = index,
                ratio = outcome.ratio,
                error = ?outcome.error.as_ref().map(|e| e.to_string()),
                "attempt rejected, escalating"
            );
            outcomes.push(outcome);
        }

        warn!(
            attempts = outcomes.len(),
            "restoration exhausted, falling back to original text"
        );
        RestorationResult::unchanged(text, outcomes)
    }

    /// Analyse `text` and only run the table when something was detected.
    pub async fn restore_if_needed(
        &self,
        text: &str,
        cancel: &CancelSignal,
    ) -> (IssueReport, RestorationResult) {
        let report = self.analyzer.analyze(text);
        if !report.has_issues {
            debug!("no artifacts detected, restoration skipped");
            let result = RestorationResult {
                final_text: text.to_string(),
                outcomes: Vec::new(),
                used_fallback: false,
                skipped: true,
                cancelled: false,
            };
            return (report, result);
        }

        info!(
            severity = %report.severity,
            issues = report.issues.len(),
            "artifacts detected, starting restoration"
        );
        let result = self.restore(text, cancel).await;
        (report, result)
    }
}
