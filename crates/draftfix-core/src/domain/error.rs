//! Domain-level error taxonomy for draftfix.
//!
//! Routine outcomes (failed attempts, gate rejections, duplicate skips) are
//! values, not errors. What remains here are faults that stop a caller:
//! bad configuration, ledger storage failures and artifact I/O.

use draftfix_ledger::LedgerError;

use crate::pipeline::BatchReport;

/// Errors produced while validating an attempt policy table.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PolicyError {
    #[error("attempt policy table is empty")]
    Empty,

    #[error("attempt {index}: min_accept_ratio {ratio} outside (0, 1]")]
    RatioOutOfRange { index: usize, ratio: f64 },

    #[error("attempt {index}: min_accept_ratio {ratio} exceeds previous attempt's {previous}")]
    RatioIncreases {
        index: usize,
        ratio: f64,
        previous: f64,
    },

    #[error("attempt {index}: chunk_max_chars must be at least 1")]
    ZeroChunkSize { index: usize },

    #[error("attempt {index}: timeout_ms must be at least 1")]
    ZeroTimeout { index: usize },
}

/// draftfix domain errors.
#[derive(Debug, thiserror::Error)]
pub enum DraftfixError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid attempt policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("batch worker failed: {0}")]
    Worker(String),

    /// A batch stopped on a storage fault; `report` covers the drafts that
    /// were decided before it stopped.
    #[error("batch aborted: {source}")]
    BatchAborted {
        report: Box<BatchReport>,
        source: Box<DraftfixError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for draftfix domain operations.
pub type Result<T> = std::result::Result<T, DraftfixError>;
