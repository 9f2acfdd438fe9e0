//! Structured lifecycle events for draft processing.
//!
//! Every event carries an `event` field (`draft.restored`, `gate.evaluated`,
//! `draft.disposed`) so log pipelines can filter on it.

use tracing::{info, warn, Span};

/// Span tagged with the draft id. Instrument a draft's future with it.
pub fn draft_span(draft_id: &str) -> Span {
    tracing::info_span!("draftfix.draft", draft_id = %draft_id)
}

/// Emit event: restoration finished for a draft.
pub fn emit_restoration_finished(
    draft_id: &str,
    attempts: usize,
    accepted_attempt: Option<usize>,
    used_fallback: bool,
) {
    if used_fallback {
        warn!(
            event = "draft.restored",
            draft_id = %draft_id,
            attempts = attempts,
            used_fallback = true,
        );
    } else {
        info!(
            event = "draft.restored",
            draft_id = %draft_id,
            attempts = attempts,
            accepted_attempt = ?accepted_attempt,
            used_fallback = false,
        );
    }
}

/// Emit event: gate verdict for a candidate.
pub fn emit_gate_evaluated(draft_id: &str, score: u32, can_publish: bool, errors: usize) {
    info!(
        event = "gate.evaluated",
        draft_id = %draft_id,
        score = score,
        can_publish = can_publish,
        errors = errors,
    );
}

/// Emit event: final disposition of a draft.
pub fn emit_draft_disposed(draft_id: &str, disposition: &str) {
    info!(event = "draft.disposed", draft_id = %draft_id, disposition = %disposition);
}
