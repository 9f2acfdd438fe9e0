//! draftfix core library
//!
//! Detects formatting artifacts in article drafts, repairs them through an
//! escalating sequence of rewrite attempts, gates the result and publishes
//! each article at most once.

pub mod analyzer;
pub mod chunker;
pub mod config;
pub mod domain;
pub mod executor;
pub mod gate;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod policy;
pub mod publish;
pub mod readability;
pub mod report;
pub mod rewrite;
pub mod telemetry;

pub use analyzer::{
    analyze, IssueAnalyzer, IssueDescriptor, IssueKind, IssueMetrics, IssueReport, IssueRule,
    PhraseCount, Severity, SeverityThresholds,
};
pub use config::{LedgerBackend, PipelineConfig};
pub use domain::{ArticleDraft, DraftId, DraftfixError, PolicyError, Result};
pub use executor::{length_ratio, AttemptError, AttemptExecutor, RestorationOutcome};
pub use gate::{evaluate, GateThresholds, QualityGate, QualityVerdict};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use orchestrator::{CancelHandle, CancelSignal, EscalationOrchestrator, RestorationResult};
pub use pipeline::{
    BatchCounts, BatchReport, Disposition, DraftReport, FaultedDraft, PipelineContext,
    PipelineSettings, PublishOutcome,
};
pub use policy::{AttemptPolicyTable, ModelTier, PromptStrictness, RestorationAttemptConfig};
pub use publish::{PublishError, Publisher};
pub use readability::{Readability, TextStats};
pub use report::{read_batch_report, write_batch_report};
pub use rewrite::{RewriteCapability, RewriteError};

pub use obs::{draft_span, emit_draft_disposed, emit_gate_evaluated, emit_restoration_finished};
pub use telemetry::init_tracing;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
