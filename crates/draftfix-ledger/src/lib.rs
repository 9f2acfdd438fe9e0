//! draftfix-ledger: Publication Ledger for draftfix
//!
//! This crate records which drafts have already been published so that an
//! unattended pipeline never publishes the same article twice.
//!
//! ## Dedup Layer
//!
//! Focus: at-most-once publication, append-only history, cheap membership
//! lookups at corpus scale.
//!
//! ## Key Components
//!
//! - `PublishLedger`: async trait for `has_published` / `record`
//! - `Identity`: stable key derived from a normalized title (plus optional date)
//! - `IdentityLocks`: identity-scoped mutual exclusion for check-then-append
//! - `FileLedger`: line-oriented append log with an in-memory index
//! - `SurrealPublishLedger`: SurrealDB table with a unique identity index

mod error;
pub mod fakes;
pub mod file_ledger;
pub mod identity;
pub mod locks;
mod migrations;
pub mod storage_traits;
pub mod surreal_ledger;

pub use error::LedgerError;
pub use file_ledger::FileLedger;
pub use identity::{identity_of, normalize_title};
pub use locks::IdentityLocks;
pub use storage_traits::{ContentDigest, Identity, LedgerEntry, LedgerResult, PublishLedger};
pub use surreal_ledger::SurrealPublishLedger;
