//! Pipeline counters.
//!
//! Counters are incremented silently at the call site. Call
//! [`PipelineMetrics::flush`] to emit the current values as a single
//! `tracing::info!` event at the end of a batch. One instance lives in each
//! `PipelineContext`; there is no process-wide singleton.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free atomic counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    drafts_processed: AtomicU64,
    attempts_run: AtomicU64,
    attempts_accepted: AtomicU64,
    fallbacks: AtomicU64,
    published: AtomicU64,
    duplicates: AtomicU64,
    gate_rejections: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub drafts_processed: u64,
    pub attempts_run: u64,
    pub attempts_accepted: u64,
    pub fallbacks: u64,
    pub published: u64,
    pub duplicates: u64,
    pub gate_rejections: u64,
    pub publish_failures: u64,
}

fn bump(counter: &AtomicU64, by: u64, metric: &'static str) {
    counter.fetch_add(by, Ordering::Relaxed);
    tracing::trace!(metric, by, "counter incremented");
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            drafts_processed: AtomicU64::new(0),
            attempts_run: AtomicU64::new(0),
            attempts_accepted: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            published: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            gate_rejections: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_drafts_processed(&self) {
        bump(&self.drafts_processed, 1, "drafts_processed");
    }

    /// Add `n` executed attempts.
    pub fn add_attempts_run(&self, n: u64) {
        if n > 0 {
            bump(&self.attempts_run, n, "attempts_run");
        }
    }

    pub fn inc_attempts_accepted(&self) {
        bump(&self.attempts_accepted, 1, "attempts_accepted");
    }

    pub fn inc_fallbacks(&self) {
        bump(&self.fallbacks, 1, "fallbacks");
    }

    pub fn inc_published(&self) {
        bump(&self.published, 1, "published");
    }

    pub fn inc_duplicates(&self) {
        bump(&self.duplicates, 1, "duplicates");
    }

    pub fn inc_gate_rejections(&self) {
        bump(&self.gate_rejections, 1, "gate_rejections");
    }

    pub fn inc_publish_failures(&self) {
        bump(&self.publish_failures, 1, "publish_failures");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            drafts_processed: self.drafts_processed.load(Ordering::Relaxed),
            attempts_run: self.attempts_run.load(Ordering::Relaxed),
            attempts_accepted: self.attempts_accepted.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            gate_rejections: self.gate_rejections.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            drafts_processed = s.drafts_processed,
            attempts_run = s.attempts_run,
            attempts_accepted = s.attempts_accepted,
            fallbacks = s.fallbacks,
            published = s.published,
            duplicates = s.duplicates,
            gate_rejections = s.gate_rejections,
            publish_failures = s.publish_failures,
        );
    }
}
