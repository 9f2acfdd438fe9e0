use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use draftfix_core::{
    read_batch_report, write_batch_report, ArticleDraft, CancelSignal, Disposition,
    DraftfixError, ModelTier, PipelineConfig, PipelineContext, PipelineSettings, PromptStrictness,
    PublishError, Publisher, RewriteCapability, RewriteError,
};
use draftfix_ledger::fakes::MemoryPublishLedger;
use draftfix_ledger::{identity_of, FileLedger, LedgerError, PublishLedger};
use tempfile::tempdir;

const BODY: &str = "The harbour board met on Tuesday to review the plans for the new ferry terminal and its car park. \
Members asked for a second traffic survey before any contract is signed with the builders. \
The chair said the vote would be held at the next public meeting in the town hall. \
Residents who live near the quay will be able to comment on the proposal until the end of the month.

Local shops along the front have mixed views about the project and the noise it could bring. \
Some owners expect more visitors during the summer season once the larger boats start to call. \
Others worry that two years of building work will keep their regular customers away from the harbour. \
A group of traders has written to the council asking for help with rates while the work goes on.";

struct Echo;

#[async_trait]
impl RewriteCapability for Echo {
    async fn rewrite(
        &self,
        _tier: &ModelTier,
        _strictness: PromptStrictness,
        chunk: &str,
    ) -> Result<String, RewriteError> {
        Ok(chunk.to_string())
    }
}

/// Records every publish; fails the first `fail_first` calls.
#[derive(Default)]
struct RecordingPublisher {
    fail_first: usize,
    calls: AtomicUsize,
}

impl RecordingPublisher {
    fn failing(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        _title: &str,
        _body: &str,
        _image_ref: Option<&str>,
    ) -> Result<String, PublishError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if n < self.fail_first {
            return Err(PublishError::Unavailable("503 from destination".to_string()));
        }
        Ok(format!("post/{n}"))
    }
}

fn context(
    publisher: Arc<RecordingPublisher>,
    ledger: Arc<dyn PublishLedger>,
) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(Arc::new(Echo), publisher, ledger))
}

fn draft(id: &str, title: &str) -> ArticleDraft {
    ArticleDraft::new(id, title, BODY)
}

#[tokio::test]
async fn clean_draft_is_published_and_recorded() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(MemoryPublishLedger::new());
    let ctx = context(publisher.clone(), ledger.clone());

    let report = ctx
        .process_draft(&draft("d1", "Harbour vote"), &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        report.disposition,
        Disposition::Published {
            destination_ref: "post/0".to_string()
        }
    );
    assert!(report.restoration_skipped);
    assert!(report.attempts.is_empty());
    assert_eq!(report.verdict.as_ref().map(|v| v.score), Some(100));
    assert!(ledger
        .has_published(&identity_of("Harbour vote", None))
        .await
        .unwrap());
}

#[tokio::test]
async fn second_draft_with_same_title_is_duplicate_skipped() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = context(publisher.clone(), Arc::new(MemoryPublishLedger::new()));

    let first = ctx
        .process_draft(&draft("a", "X"), &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();
    let second = ctx
        .process_draft(&draft("b", "x!"), &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(first.disposition, Disposition::Published { .. }));
    assert_eq!(second.disposition, Disposition::DuplicateSkipped);
    assert!(second.verdict.is_none());
    assert_eq!(publisher.calls(), 1);
    assert_eq!(ctx.metrics().snapshot().duplicates, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batch_publishes_each_identity_once() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(MemoryPublishLedger::new());
    let ctx = context(publisher.clone(), ledger.clone());

    let mut drafts: Vec<ArticleDraft> = (0..6)
        .map(|i| draft(&format!("same-{i}"), "Ferry Terminal Approved"))
        .collect();
    drafts.push(draft("other", "Harbour Master Retires"));

    let report = Arc::clone(&ctx)
        .run_batch(drafts, CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.drafts.len(), 7);
    assert_eq!(report.counts.published, 2);
    assert_eq!(report.counts.duplicate_skipped, 5);
    assert_eq!(publisher.calls(), 2);
    assert_eq!(ledger.len(), 2);
    assert!(!report.cancelled);
    // input order is preserved
    assert_eq!(report.drafts[6].draft_id.as_str(), "other");
}

#[tokio::test]
async fn publish_failure_leaves_ledger_untouched_and_retry_succeeds() {
    let publisher = Arc::new(RecordingPublisher::failing(1));
    let ledger = Arc::new(MemoryPublishLedger::new());
    let ctx = context(publisher.clone(), ledger.clone());
    let d = draft("d1", "Pier Extension");

    let first = ctx
        .process_draft(&d, &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();
    match &first.disposition {
        Disposition::PublishFailed { error } => assert!(error.contains("503")),
        other => panic!("expected publish failure, got {other:?}"),
    }
    assert!(ledger.is_empty());

    let retry = ctx
        .process_draft(&d, &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(retry.disposition, Disposition::Published { .. }));
    assert_eq!(ledger.len(), 1);
    assert_eq!(publisher.calls(), 2);
}

#[tokio::test]
async fn gate_rejection_never_calls_publisher() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = context(publisher.clone(), Arc::new(MemoryPublishLedger::new()));

    let report = ctx
        .process_draft(
            &ArticleDraft::new("short", "Too Short", "One line only."),
            &CancelSignal::never(),
        )
        .await
        .unwrap()
        .unwrap();

    match report.disposition {
        Disposition::GateRejected { reason } => assert!(reason.starts_with("too short")),
        other => panic!("expected gate rejection, got {other:?}"),
    }
    assert_eq!(publisher.calls(), 0);
    assert_eq!(ctx.metrics().snapshot().gate_rejections, 1);
}

#[tokio::test]
async fn cancelled_batch_starts_nothing() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(MemoryPublishLedger::new());
    let ctx = context(publisher.clone(), ledger.clone());
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();

    let report = Arc::clone(&ctx)
        .run_batch(vec![draft("a", "One"), draft("b", "Two")], signal)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.drafts.is_empty());
    assert_eq!(report.counts.not_started, 2);
    assert_eq!(publisher.calls(), 0);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn ledger_fault_aborts_batch_with_partial_report() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(MemoryPublishLedger::new());
    ledger.set_fail_writes(true);
    let ctx = Arc::new(
        PipelineContext::new(Arc::new(Echo), publisher.clone(), ledger.clone()).with_settings(
            PipelineSettings {
                workers: 1,
                ..PipelineSettings::default()
            },
        ),
    );

    let err = ctx
        .run_batch(vec![draft("a", "One"), draft("b", "Two")], CancelSignal::never())
        .await
        .unwrap_err();

    let DraftfixError::BatchAborted { report, source } = err else {
        panic!("expected an aborted batch, got {err:?}");
    };
    assert!(matches!(
        *source,
        DraftfixError::Ledger(LedgerError::Backend(_))
    ));
    // the first draft reached the destination before the append failed
    assert_eq!(publisher.calls(), 1);
    assert_eq!(report.faulted.len(), 1);
    assert_eq!(report.faulted[0].draft_id.as_str(), "a");
    assert_eq!(report.counts.faulted, 1);
    // the second draft is skipped once the first one hit the fault
    assert_eq!(report.not_started.len(), 1);
    assert_eq!(report.not_started[0].as_str(), "b");
    assert!(report.drafts.is_empty());
    assert!(!report.cancelled);

    // the partial report can still be persisted
    let dir = tempdir().unwrap();
    write_batch_report(&report, dir.path()).unwrap();
    assert_eq!(read_batch_report(&report.run_id, dir.path()).unwrap(), *report);
}

#[tokio::test]
async fn file_ledger_dedups_across_contexts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("published.log");

    let first_publisher = Arc::new(RecordingPublisher::default());
    let ledger = Arc::new(FileLedger::open(&path).unwrap());
    let ctx = context(first_publisher.clone(), ledger);
    let report = Arc::clone(&ctx)
        .run_batch(vec![draft("a", "Harbour Vote")], CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(report.counts.published, 1);

    // fresh process: reopen the log
    let second_publisher = Arc::new(RecordingPublisher::default());
    let reopened = Arc::new(FileLedger::open(&path).unwrap());
    let ctx = context(second_publisher.clone(), reopened);
    let report = Arc::clone(&ctx)
        .run_batch(vec![draft("b", "harbour vote")], CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(report.counts.duplicate_skipped, 1);
    assert_eq!(second_publisher.calls(), 0);
}

#[tokio::test]
async fn batch_report_round_trips_with_digest() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = context(publisher, Arc::new(MemoryPublishLedger::new()));
    let report = Arc::clone(&ctx)
        .run_batch(
            vec![draft("a", "One"), ArticleDraft::new("b", "Two", "tiny")],
            CancelSignal::never(),
        )
        .await
        .unwrap();
    assert_eq!(report.counts.published, 1);
    assert_eq!(report.counts.gate_rejected, 1);
    assert_eq!(report.metrics.drafts_processed, 2);

    let dir = tempdir().unwrap();
    write_batch_report(&report, dir.path()).unwrap();
    let loaded = read_batch_report(&report.run_id, dir.path()).unwrap();
    assert_eq!(loaded, report);
}

#[tokio::test]
async fn context_built_from_config_applies_thresholds() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [gate]
        min_chars = 5000

        [batch]
        workers = 2
        "#,
    )
    .unwrap();

    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = Arc::new(
        PipelineContext::new(
            Arc::new(Echo),
            publisher.clone(),
            Arc::new(MemoryPublishLedger::new()),
        )
        .with_policy(config.restoration.attempts.clone())
        .with_gate_thresholds(config.gate)
        .with_settings(config.settings()),
    );
    assert_eq!(ctx.settings().workers, 2);

    let report = ctx
        .process_draft(&draft("a", "One"), &CancelSignal::never())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(report.disposition, Disposition::GateRejected { .. }));
    assert_eq!(publisher.calls(), 0);
}
