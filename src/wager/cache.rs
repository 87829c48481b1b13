//! Payout cache.
//!
//! Derived data only: every entry is reproducible by re-running the engine on
//! the settled wager's frozen stake snapshot. Entries are written once, after a
//! settlement has been persisted.

use crate::wager::payout::PayoutResult;
use crate::wager::types::WagerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct PayoutCache {
    entries: RwLock<HashMap<WagerId, Arc<PayoutResult>>>,
}

impl PayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, wager_id: &WagerId) -> Option<Arc<PayoutResult>> {
        self.entries.read().get(wager_id).cloned()
    }

    /// Insert unless an entry exists; returns the cached value either way.
    pub fn get_or_insert(&self, result: PayoutResult) -> Arc<PayoutResult> {
        self.entries
            .write()
            .entry(result.wager_id.clone())
            .or_insert_with(|| Arc::new(result))
            .clone()
    }

    pub fn invalidate(&self, wager_id: &WagerId) -> bool {
        self.entries.write().remove(wager_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
