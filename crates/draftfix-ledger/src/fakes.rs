//! In-memory ledger for tests and throwaway runs
//!
//! `MemoryPublishLedger` satisfies the [`PublishLedger`] contract without any
//! external dependencies. It can also be switched into a failing mode to
//! exercise storage-fault propagation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    index: HashMap<Identity, usize>,
}

/// In-memory ledger backed by a `Vec` plus a `HashMap<Identity, position>`.
#[derive(Debug, Default)]
pub struct MemoryPublishLedger {
    state: Mutex<LedgerState>,
    fail_writes: AtomicBool,
}

impl MemoryPublishLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PublishLedger for MemoryPublishLedger {
    async fn has_published(&self, identity: &Identity) -> LedgerResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.index.contains_key(identity))
    }

    async fn record(&self, entry: LedgerEntry) -> LedgerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend("injected write failure".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if state.index.contains_key(&entry.identity) {
            return Err(LedgerError::DuplicateIdentity {
                identity: entry.identity.0.clone(),
            });
        }
        let pos = state.entries.len();
        state.index.insert(entry.identity.clone(), pos);
        state.entries.push(entry);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> LedgerResult<Option<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .index
            .get(identity)
            .map(|&pos| state.entries[pos].clone()))
    }

    async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state.entries.clone())
    }
}
