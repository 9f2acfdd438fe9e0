//! Identity-scoped mutual exclusion.
//!
//! The ledger's check-then-append sequence is the only contested resource in
//! a batch run. Two workers holding drafts with the same identity must not
//! both observe `has_published == false` and both publish, so the whole
//! check → publish → record sequence runs under the guard returned by
//! [`IdentityLocks::lock`]. Different identities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::storage_traits::Identity;

/// Registry of per-identity async mutexes.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    slots: Mutex<HashMap<Identity, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one check-then-append sequence.
#[derive(Debug)]
pub struct IdentityGuard {
    identity: Identity,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityGuard {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `identity`, then hold it.
    pub async fn lock(&self, identity: &Identity) -> IdentityGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots referenced only by the map are idle.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(identity.clone()).or_default())
        };
        IdentityGuard {
            identity: identity.clone(),
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of identities currently held or awaited.
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
