//! In-process lock registry.
//!
//! - Wager gate (`RwLock`): stake writes hold it shared, lifecycle transitions
//!   hold it exclusive, so no stake lands while a wager is being closed or settled.
//! - Stake slot (`Mutex`): serializes writes per (wager, participant) so
//!   single-vote replacement never loses an update.
//!
//! Entries live only while some caller holds them. After each scoped call the
//! registry drops any gate or slot whose `Arc` it alone still owns, so rejected
//! calls and wagers that never settle leave nothing behind.
//!
//! Cross-process exclusion is the store's compare-and-swap; these locks only
//! order work inside one process.

use crate::wager::types::{ParticipantId, WagerId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

type SlotKey = (WagerId, ParticipantId);

#[derive(Default)]
pub struct LockRegistry {
    gates: Mutex<HashMap<WagerId, Arc<RwLock<()>>>>,
    slots: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` holding the wager gate shared and the participant's slot.
    pub fn with_stake_slot<T>(
        &self,
        wager_id: &WagerId,
        participant: &ParticipantId,
        f: impl FnOnce() -> T,
    ) -> T {
        let result = {
            let gate = self.wager_gate(wager_id);
            let _shared = gate.read();
            let slot = self.stake_slot(wager_id, participant);
            let _exclusive = slot.lock();
            f()
        };
        self.release_idle_slot(wager_id, participant);
        self.release_idle_gate(wager_id);
        result
    }

    /// Run `f` holding the wager gate exclusively.
    pub fn with_wager_exclusive<T>(&self, wager_id: &WagerId, f: impl FnOnce() -> T) -> T {
        let result = {
            let gate = self.wager_gate(wager_id);
            let _exclusive = gate.write();
            f()
        };
        self.release_idle_gate(wager_id);
        result
    }

    pub fn wager_gate(&self, wager_id: &WagerId) -> Arc<RwLock<()>> {
        self.gates
            .lock()
            .entry(wager_id.clone())
            .or_default()
            .clone()
    }

    pub fn stake_slot(&self, wager_id: &WagerId, participant: &ParticipantId) -> Arc<Mutex<()>> {
        self.slots
            .lock()
            .entry((wager_id.clone(), participant.clone()))
            .or_default()
            .clone()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.lock().len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    // Clones are only handed out under the map mutex, so a strong count of 1
    // seen under that mutex means nobody else can be holding or waiting.
    fn release_idle_gate(&self, wager_id: &WagerId) {
        let mut gates = self.gates.lock();
        if gates.get(wager_id).map_or(false, |g| Arc::strong_count(g) == 1) {
            gates.remove(wager_id);
        }
    }

    fn release_idle_slot(&self, wager_id: &WagerId, participant: &ParticipantId) {
        let key = (wager_id.clone(), participant.clone());
        let mut slots = self.slots.lock();
        if slots.get(&key).map_or(false, |s| Arc::strong_count(s) == 1) {
            slots.remove(&key);
        }
    }
}
