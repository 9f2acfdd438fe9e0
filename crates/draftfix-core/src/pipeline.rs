//! Draft pipeline: restore, gate, publish once.
//!
//! [`PipelineContext`] carries every collaborator a draft needs. There is
//! no global state; tests build a context around fakes.
//!
//! Per draft:
//!
//! ```text
//! ledger pre-check ──dup──▶ DuplicateSkipped
//!      │
//! analyze ─▶ restore_if_needed ─▶ gate ──reject──▶ GateRejected
//!                                   │
//!                         publish_if_new (identity lock)
//!                          │          │           │
//!                      Published  Duplicate  PublishFailed
//! ```
//!
//! Only ledger storage faults escape as errors. Every other outcome is a
//! [`Disposition`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, instrument, warn, Instrument};

use draftfix_ledger::{identity_of, Identity, IdentityLocks, LedgerEntry, PublishLedger};

use crate::analyzer::IssueAnalyzer;
use crate::domain::{ArticleDraft, DraftId, DraftfixError, Result};
use crate::executor::{AttemptError, AttemptExecutor, RestorationOutcome};
use crate::gate::{GateThresholds, QualityGate, QualityVerdict};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::obs;
use crate::orchestrator::{CancelSignal, EscalationOrchestrator, RestorationResult};
use crate::policy::AttemptPolicyTable;
use crate::publish::{PublishError, Publisher};
use crate::rewrite::RewriteCapability;

/// Knobs that are not part of the policy table or the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Concurrent rewrite calls within one attempt.
    pub chunk_concurrency: usize,
    /// Drafts processed concurrently by [`PipelineContext::run_batch`].
    pub workers: usize,
    /// Scope identities to the UTC publication date as well as the title.
    pub identity_includes_date: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_concurrency: 2,
            workers: 4,
            identity_includes_date: false,
        }
    }
}

/// Result of [`PipelineContext::publish_if_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { destination_ref: String },
    Duplicate,
    Failed(PublishError),
}

/// Final classification of a processed draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    Published { destination_ref: String },
    DuplicateSkipped,
    GateRejected { reason: String },
    PublishFailed { error: String },
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Published { .. } => "published",
            Disposition::DuplicateSkipped => "duplicate_skipped",
            Disposition::GateRejected { .. } => "gate_rejected",
            Disposition::PublishFailed { .. } => "publish_failed",
        }
    }
}

/// Compact record of one attempt, without the restored text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_index: usize,
    pub success: bool,
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
    pub elapsed_ms: u64,
}

impl From<&RestorationOutcome> for AttemptRecord {
    fn from(o: &RestorationOutcome) -> Self {
        Self {
            attempt_index: o.attempt_index,
            success: o.success,
            ratio: o.ratio,
            error: o.error.clone(),
            elapsed_ms: o.elapsed_ms,
        }
    }
}

/// Everything decided about one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReport {
    pub draft_id: DraftId,
    pub identity: Identity,
    pub disposition: Disposition,
    /// Index of the accepted attempt, if one was accepted.
    pub accepted_attempt: Option<usize>,
    pub used_fallback: bool,
    /// No artifacts were found, so no attempt ran.
    pub restoration_skipped: bool,
    pub attempts: Vec<AttemptRecord>,
    /// Absent when the draft was skipped before gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<QualityVerdict>,
}

/// Per-disposition totals of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub published: usize,
    pub duplicate_skipped: usize,
    pub gate_rejected: usize,
    pub publish_failed: usize,
    pub not_started: usize,
    #[serde(default)]
    pub faulted: usize,
}

/// A draft stopped by a storage fault. Its article may already be at the
/// destination without a ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultedDraft {
    pub draft_id: DraftId,
    pub error: String,
}

/// Outcome of [`PipelineContext::run_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Processed drafts in input order.
    pub drafts: Vec<DraftReport>,
    /// Drafts left untouched because the batch was cancelled.
    pub not_started: Vec<DraftId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faulted: Vec<FaultedDraft>,
    pub cancelled: bool,
    pub counts: BatchCounts,
    pub metrics: MetricsSnapshot,
}

impl BatchReport {
    fn tally(drafts: &[DraftReport], not_started: usize, faulted: usize) -> BatchCounts {
        let mut counts = BatchCounts {
            not_started,
            faulted,
            ..BatchCounts::default()
        };
        for d in drafts {
            match d.disposition {
                Disposition::Published { .. } => counts.published += 1,
                Disposition::DuplicateSkipped => counts.duplicate_skipped += 1,
                Disposition::GateRejected { .. } => counts.gate_rejected += 1,
                Disposition::PublishFailed { .. } => counts.publish_failed += 1,
            }
        }
        counts
    }
}

/// Collaborators and limits shared by every draft in a run.
pub struct PipelineContext {
    policy: Arc<AttemptPolicyTable>,
    analyzer: Arc<IssueAnalyzer>,
    gate_thresholds: GateThresholds,
    rewriter: Arc<dyn RewriteCapability>,
    publisher: Arc<dyn Publisher>,
    ledger: Arc<dyn PublishLedger>,
    locks: IdentityLocks,
    metrics: PipelineMetrics,
    settings: PipelineSettings,
}

impl PipelineContext {
    /// Context with the standard policy table, analyzer and gate.
    pub fn new(
        rewriter: Arc<dyn RewriteCapability>,
        publisher: Arc<dyn Publisher>,
        ledger: Arc<dyn PublishLedger>,
    ) -> Self {
        Self {
            policy: Arc::new(AttemptPolicyTable::standard()),
            analyzer: Arc::new(IssueAnalyzer::standard()),
            gate_thresholds: GateThresholds::default(),
            rewriter,
            publisher,
            ledger,
            locks: IdentityLocks::new(),
            metrics: PipelineMetrics::new(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_policy(mut self, policy: AttemptPolicyTable) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_analyzer(mut self, analyzer: IssueAnalyzer) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn with_gate_thresholds(mut self, thresholds: GateThresholds) -> Self {
        self.gate_thresholds = thresholds;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn policy(&self) -> &AttemptPolicyTable {
        &self.policy
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn ledger(&self) -> &Arc<dyn PublishLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn orchestrator(&self) -> EscalationOrchestrator {
        EscalationOrchestrator::new(
            Arc::clone(&self.policy),
            AttemptExecutor::new(Arc::clone(&self.rewriter), self.settings.chunk_concurrency),
            Arc::clone(&self.analyzer),
        )
    }

    pub fn gate(&self) -> QualityGate {
        QualityGate::new(Arc::clone(&self.analyzer), self.gate_thresholds)
    }

    /// Identity of `draft` under the configured scope.
    pub fn identity_for(&self, draft: &ArticleDraft) -> Identity {
        let date = self
            .settings
            .identity_includes_date
            .then(|| Utc::now().date_naive());
        identity_of(&draft.title, date)
    }

    /// Publish unless `identity` is already in the ledger.
    ///
    /// The check, the publisher call and the ledger append run under the
    /// identity's lock, so concurrent callers with one identity publish at
    /// most once. A publisher failure leaves the ledger untouched.
    #[instrument(skip(self, title, body, image_ref), fields(identity = %identity))]
    pub async fn publish_if_new(
        &self,
        identity: &Identity,
        title: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> Result<PublishOutcome> {
        let _guard = self.locks.lock(identity).await;

        if self.ledger.has_published(identity).await? {
            debug!("identity already published");
            return Ok(PublishOutcome::Duplicate);
        }

        let destination_ref = match self.publisher.publish(title, body, image_ref).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "publish failed, ledger untouched");
                return Ok(PublishOutcome::Failed(e));
            }
        };

        let entry = LedgerEntry {
            identity: identity.clone(),
            published_at: Utc::now(),
            destination_ref: destination_ref.clone(),
            title: title.to_string(),
        };
        if let Err(e) = self.ledger.record(entry).await {
            error!(
                error = %e,
                destination_ref = %destination_ref,
                "article published but ledger append failed"
            );
            return Err(e.into());
        }

        info!(destination_ref = %destination_ref, "published");
        Ok(PublishOutcome::Published { destination_ref })
    }

    /// Run one draft end to end.
    ///
    /// Returns `Ok(None)` when cancellation was observed before the draft
    /// reached the gate; nothing was published and the ledger is unchanged.
    pub async fn process_draft(
        &self,
        draft: &ArticleDraft,
        cancel: &CancelSignal,
    ) -> Result<Option<DraftReport>> {
        let span = obs::draft_span(draft.id.as_str());
        self.process_draft_inner(draft, cancel).instrument(span).await
    }

    async fn process_draft_inner(
        &self,
        draft: &ArticleDraft,
        cancel: &CancelSignal,
    ) -> Result<Option<DraftReport>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let id = draft.id.as_str();
        let identity = self.identity_for(draft);
        let mut report = DraftReport {
            draft_id: draft.id.clone(),
            identity: identity.clone(),
            disposition: Disposition::DuplicateSkipped,
            accepted_attempt: None,
            used_fallback: false,
            restoration_skipped: false,
            attempts: Vec::new(),
            verdict: None,
        };

        // Cheap pre-check; the authoritative one runs under the lock.
        if self.ledger.has_published(&identity).await? {
            return Ok(Some(self.finish(report)));
        }

        let (_issues, restoration) = self
            .orchestrator()
            .restore_if_needed(&draft.body, cancel)
            .await;
        self.record_restoration(id, &restoration);
        if restoration.cancelled {
            info!(draft_id = %id, "draft cancelled during restoration");
            return Ok(None);
        }

        report.accepted_attempt = restoration.accepted_attempt();
        report.used_fallback = restoration.used_fallback;
        report.restoration_skipped = restoration.skipped;
        report.attempts = restoration.outcomes.iter().map(AttemptRecord::from).collect();

        let verdict = self.gate().evaluate(&restoration.final_text);
        obs::emit_gate_evaluated(id, verdict.score, verdict.can_publish, verdict.errors.len());

        if !verdict.can_publish {
            let reason = verdict
                .rejection_reason()
                .unwrap_or_else(|| "rejected".to_string());
            report.disposition = Disposition::GateRejected { reason };
            report.verdict = Some(verdict);
            return Ok(Some(self.finish(report)));
        }
        report.verdict = Some(verdict);

        report.disposition = match self
            .publish_if_new(
                &identity,
                &draft.title,
                &restoration.final_text,
                draft.image_ref.as_deref(),
            )
            .await?
        {
            PublishOutcome::Published { destination_ref } => {
                Disposition::Published { destination_ref }
            }
            PublishOutcome::Duplicate => Disposition::DuplicateSkipped,
            PublishOutcome::Failed(e) => Disposition::PublishFailed {
                error: e.to_string(),
            },
        };
        Ok(Some(self.finish(report)))
    }

    fn record_restoration(&self, draft_id: &str, r: &RestorationResult) {
        self.metrics.add_attempts_run(r.outcomes.len() as u64);
        if r.skipped {
            return;
        }
        if r.accepted_attempt().is_some() {
            self.metrics.inc_attempts_accepted();
        } else if !r.cancelled {
            self.metrics.inc_fallbacks();
        }
        obs::emit_restoration_finished(
            draft_id,
            r.outcomes.len(),
            r.accepted_attempt(),
            r.used_fallback,
        );
    }

    fn finish(&self, report: DraftReport) -> DraftReport {
        self.metrics.inc_drafts_processed();
        match report.disposition {
            Disposition::Published { .. } => self.metrics.inc_published(),
            Disposition::DuplicateSkipped => self.metrics.inc_duplicates(),
            Disposition::GateRejected { .. } => self.metrics.inc_gate_rejections(),
            Disposition::PublishFailed { .. } => self.metrics.inc_publish_failures(),
        }
        obs::emit_draft_disposed(report.draft_id.as_str(), report.disposition.label());
        report
    }

    /// Process `drafts` on `settings.workers` concurrent workers.
    ///
    /// Drafts not yet started when `cancel` is raised are listed in
    /// `not_started`. A ledger storage fault stops the batch: drafts that
    /// have not started are skipped and, once in-flight drafts finish,
    /// [`DraftfixError::BatchAborted`] carries the first fault together
    /// with the report of everything decided so far.
    #[instrument(skip_all, fields(drafts = drafts.len(), workers = self.settings.workers))]
    pub async fn run_batch(
        self: Arc<Self>,
        drafts: Vec<ArticleDraft>,
        cancel: CancelSignal,
    ) -> Result<BatchReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let sem = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let (fail_tx, _fail_rx) = watch::channel(false);
        let fail_flag = Arc::new(fail_tx);

        let mut tasks = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let ctx = Arc::clone(&self);
            let sem = Arc::clone(&sem);
            let cancel = cancel.clone();
            let fail_flag = Arc::clone(&fail_flag);
            let fail_rx = fail_flag.subscribe();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                if *fail_rx.borrow() {
                    return (draft.id, Ok(None));
                }
                let result = ctx.process_draft(&draft, &cancel).await;
                if result.is_err() {
                    fail_flag.send_replace(true);
                }
                (draft.id, result)
            }));
        }

        let mut reports = Vec::new();
        let mut not_started = Vec::new();
        let mut faulted = Vec::new();
        let mut first_error: Option<DraftfixError> = None;
        for task in tasks {
            match task.await {
                Ok((_, Ok(Some(report)))) => reports.push(report),
                Ok((id, Ok(None))) => not_started.push(id),
                Ok((id, Err(e))) => {
                    error!(draft_id = %id, error = %e, "draft aborted by storage fault");
                    faulted.push(FaultedDraft {
                        draft_id: id,
                        error: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
                Err(join) => {
                    first_error.get_or_insert(DraftfixError::Worker(join.to_string()));
                }
            }
        }

        self.metrics.flush();

        let counts = BatchReport::tally(&reports, not_started.len(), faulted.len());
        info!(
            run_id = %run_id,
            published = counts.published,
            duplicate_skipped = counts.duplicate_skipped,
            gate_rejected = counts.gate_rejected,
            publish_failed = counts.publish_failed,
            not_started = counts.not_started,
            faulted = counts.faulted,
            "batch finished"
        );

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            drafts: reports,
            cancelled: cancel.is_cancelled(),
            not_started,
            faulted,
            counts,
            metrics: self.metrics.snapshot(),
        };
        match first_error {
            Some(source) => Err(DraftfixError::BatchAborted {
                report: Box::new(report),
                source: Box::new(source),
            }),
            None => Ok(report),
        }
    }
}
