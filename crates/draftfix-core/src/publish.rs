//! Destination publisher seam.

use async_trait::async_trait;

/// Failure reported by a destination.
///
/// A publish failure is fatal for the draft but leaves the ledger untouched,
/// so the draft can be retried on a later run.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("destination rejected the article: {0}")]
    Rejected(String),

    #[error("destination unavailable: {0}")]
    Unavailable(String),

    #[error("publish I/O error: {0}")]
    Io(String),
}

/// The publishing surface. Returns a destination reference (post id, URL or
/// path) on success.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        title: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> Result<String, PublishError>;
}
