//! Domain models for draftfix.
//!
//! Canonical definitions for the core entities:
//! - `ArticleDraft`: Immutable draft handed over by the upstream source
//! - `DraftfixError`: Error taxonomy for configuration and storage faults

pub mod draft;
pub mod error;

// Re-export main types and errors
pub use draft::{ArticleDraft, DraftId};
pub use error::{DraftfixError, PolicyError, Result};
