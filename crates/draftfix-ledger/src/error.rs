//! Error types for draftfix-ledger

use thiserror::Error;

/// Errors that can occur in the ledger layer
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Filesystem failure while reading or appending the log
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Backend (database) failure
    #[error("Ledger backend failed: {0}")]
    Backend(String),

    /// A persisted line could not be parsed
    #[error("Corrupt ledger line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// `record` was called for an identity that is already present
    #[error("Identity already recorded: {identity}")]
    DuplicateIdentity { identity: String },
}

impl From<surrealdb::Error> for LedgerError {
    fn from(err: surrealdb::Error) -> Self {
        LedgerError::Backend(err.to_string())
    }
}
