//! Storage trait definitions for the publication ledger
//!
//! - `PublishLedger`: append-only record of published identities
//! - `ContentDigest`: SHA-256 digest used for identities and artifact checks
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::LedgerError;

/// Result type for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private: every value comes from `from_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PublishLedger
// ---------------------------------------------------------------------------

/// Dedup key for a draft. Built by [`crate::identity_of`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub identity: Identity,
    pub published_at: DateTime<Utc>,
    /// Where the destination put it (URL, path, remote id).
    pub destination_ref: String,
    /// Title as published, kept for audit only.
    pub title: String,
}

/// Append-only publication ledger.
///
/// Guarantees:
/// - `record` is the only mutation; entries are never updated or removed.
/// - Recording an identity that already exists fails with
///   `LedgerError::DuplicateIdentity` and leaves the ledger unchanged.
/// - `has_published` reflects every successful `record` made through the
///   same backend, including across process restarts for durable backends.
#[async_trait]
pub trait PublishLedger: Send + Sync {
    /// Whether `identity` has already been published.
    async fn has_published(&self, identity: &Identity) -> LedgerResult<bool>;

    /// Append an entry. Call only after the destination confirmed success.
    async fn record(&self, entry: LedgerEntry) -> LedgerResult<()>;

    /// Look up the entry for `identity`, if any.
    async fn get(&self, identity: &Identity) -> LedgerResult<Option<LedgerEntry>>;

    /// All entries, oldest first.
    async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>>;
}
