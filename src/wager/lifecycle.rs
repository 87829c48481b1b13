//! Wager Lifecycle
//!
//! State machine gating when stakes are accepted and when settlement runs.
//!
//! ```text
//!   create ──▶ open ──(deadline / force close)──▶ closed ──(declare outcome)──▶ settled
//!               │                                                               ▲
//!               └──────────────────(declare outcome, closes first)──────────────┘
//! ```
//!
//! `pending` is legacy-only and treated as `closed`.
//!
//! # Exactly-once settlement
//!
//! `declare_outcome` runs the engine on the loaded snapshot and persists the
//! `settled` status with a compare-and-swap on the wager's version. A racing
//! duplicate either waits on the wager gate (same process) or loses the CAS
//! (any process) and then observes `AlreadySettled`. The engine result is only
//! cached and returned after the save succeeds.

use crate::config::SettlementConfig;
use crate::wager::cache::PayoutCache;
use crate::wager::collaborators::{Authorizer, ModeratorAction, Versioned, WagerStore};
use crate::wager::engine;
use crate::wager::error::{AuthorizationError, StateError, StoreError, WagerError};
use crate::wager::locks::LockRegistry;
use crate::wager::payout::PayoutResult;
use crate::wager::types::{
    Outcome, ParticipantId, Wager, WagerDraft, WagerId, WagerPatch, WagerStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct WagerLifecycle {
    store: Arc<dyn WagerStore>,
    auth: Arc<dyn Authorizer>,
    locks: Arc<LockRegistry>,
    cache: PayoutCache,
    config: SettlementConfig,
}

impl WagerLifecycle {
    pub fn new(
        store: Arc<dyn WagerStore>,
        auth: Arc<dyn Authorizer>,
        locks: Arc<LockRegistry>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            auth,
            locks,
            cache: PayoutCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn cache(&self) -> &PayoutCache {
        &self.cache
    }

    pub fn load(&self, wager_id: &WagerId) -> Result<Wager, WagerError> {
        Ok(self.store.load_wager(wager_id)?.value)
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Create an `open` wager from a moderator's draft.
    pub fn create_wager(
        &self,
        actor: &ParticipantId,
        draft: WagerDraft,
        now: DateTime<Utc>,
    ) -> Result<Wager, WagerError> {
        if !self.auth.can_moderate(actor, &draft.group_id, ModeratorAction::Create) {
            return Err(self.reject(AuthorizationError::NotModerator {
                actor: actor.clone(),
                group: draft.group_id.clone(),
                action: ModeratorAction::Create,
            }));
        }
        draft
            .validate(now, self.config.stake_floor)
            .map_err(|e| self.reject(e))?;

        let wager = draft.into_wager(WagerId::generate(), actor.clone(), now);
        self.store.insert_wager(&wager)?;

        info!(
            wager_id = %wager.id,
            group = %wager.group_id,
            mode = wager.voting_mode.as_str(),
            options = wager.options.len(),
            "Wager created"
        );
        Ok(wager)
    }

    /// Moderator closes an open wager before its deadline.
    pub fn force_close(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        now: DateTime<Utc>,
    ) -> Result<Wager, WagerError> {
        self.locks
            .with_wager_exclusive(wager_id, || self.close_now(actor, wager_id, now))
    }

    fn close_now(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        now: DateTime<Utc>,
    ) -> Result<Wager, WagerError> {
        let Versioned { value: mut wager, version } = self.store.load_wager(wager_id)?;
        self.authorize(actor, &wager, ModeratorAction::Close)?;
        match wager.status {
            WagerStatus::Open => {}
            WagerStatus::Closed | WagerStatus::Pending => {
                return Err(self.reject(StateError::AlreadyClosed {
                    wager_id: wager_id.clone(),
                }))
            }
            WagerStatus::Settled => {
                return Err(self.reject(StateError::AlreadySettled {
                    wager_id: wager_id.clone(),
                }))
            }
        }

        wager.status = WagerStatus::Closed;
        wager.closed_at = Some(now);
        self.save(&wager, version)?;

        info!(wager_id = %wager_id, actor = %actor, "Wager force-closed");
        Ok(wager)
    }

    /// Close the wager if its deadline has elapsed. Returns whether it closed.
    pub fn close_if_expired(&self, wager_id: &WagerId, now: DateTime<Utc>) -> Result<bool, WagerError> {
        self.locks
            .with_wager_exclusive(wager_id, || self.close_expired(wager_id, now))
    }

    fn close_expired(&self, wager_id: &WagerId, now: DateTime<Utc>) -> Result<bool, WagerError> {
        let Versioned { value: mut wager, version } = self.store.load_wager(wager_id)?;
        if wager.status != WagerStatus::Open || !wager.is_expired(now) {
            return Ok(false);
        }

        wager.status = WagerStatus::Closed;
        wager.closed_at = Some(now);
        match self.store.save_wager(&wager, version) {
            Ok(_) => {}
            Err(StoreError::WriteConflict { .. }) => {
                let current = self.store.load_wager(wager_id)?.value;
                if current.status != WagerStatus::Open {
                    debug!(wager_id = %wager_id, "Expiry close lost race; already {}", current.status);
                    return Ok(false);
                }
                return Err(self.save_conflict(wager_id, version));
            }
            Err(e) => return Err(self.fault(e.into())),
        }

        info!(wager_id = %wager_id, deadline = %wager.deadline, "Wager closed at deadline");
        Ok(true)
    }

    /// Declare the outcome, settle, and persist `settled` atomically.
    pub fn declare_outcome(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Arc<PayoutResult>, WagerError> {
        self.locks.with_wager_exclusive(wager_id, || {
            self.settle_now(actor, wager_id, outcome, now)
        })
    }

    fn settle_now(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Arc<PayoutResult>, WagerError> {
        let Versioned { value: mut wager, version } = self.store.load_wager(wager_id)?;
        self.authorize(actor, &wager, ModeratorAction::Settle)?;
        if !wager.status.can_settle() {
            return Err(self.reject(StateError::AlreadySettled {
                wager_id: wager_id.clone(),
            }));
        }

        wager.outcome = Some(outcome);
        let stakes = self.store.load_stakes_for_wager(wager_id)?;
        // Outcome was supplied by the caller just now, so a bad one is their mistake.
        let result = engine::settle(&wager, &stakes).map_err(|e| self.reject(e))?;
        self.verify(&result)?;

        if wager.closed_at.is_none() {
            wager.closed_at = Some(now);
        }
        let closed_early = wager.status == WagerStatus::Open;
        wager.status = WagerStatus::Settled;
        wager.settled_at = Some(now);

        match self.store.save_wager(&wager, version) {
            Ok(_) => {}
            Err(StoreError::WriteConflict { .. }) => {
                let current = self.store.load_wager(wager_id)?.value;
                if current.status.is_terminal() {
                    return Err(self.reject(StateError::AlreadySettled {
                        wager_id: wager_id.clone(),
                    }));
                }
                return Err(self.save_conflict(wager_id, version));
            }
            Err(e) => return Err(self.fault(e.into())),
        }

        info!(
            wager_id = %wager_id,
            actor = %actor,
            closed_early,
            refund = result.is_refund,
            winners = result.winners.len(),
            losers = result.losers.len(),
            pool = %result.total_pool,
            "Wager settled"
        );

        Ok(if self.config.cache_payouts {
            self.cache.get_or_insert(result)
        } else {
            Arc::new(result)
        })
    }

    /// Edit title, description, deadline, or stake bounds while open.
    pub fn edit_wager(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        patch: WagerPatch,
        now: DateTime<Utc>,
    ) -> Result<Wager, WagerError> {
        self.locks
            .with_wager_exclusive(wager_id, || self.apply_patch(actor, wager_id, patch, now))
    }

    fn apply_patch(
        &self,
        actor: &ParticipantId,
        wager_id: &WagerId,
        patch: WagerPatch,
        now: DateTime<Utc>,
    ) -> Result<Wager, WagerError> {
        let Versioned { value: mut wager, version } = self.store.load_wager(wager_id)?;
        self.authorize(actor, &wager, ModeratorAction::Edit)?;
        if wager.status != WagerStatus::Open {
            return Err(self.reject(StateError::NotOpen {
                wager_id: wager_id.clone(),
                status: wager.status,
            }));
        }
        // Past its deadline an open wager no longer takes stakes; a new deadline must not revive it.
        if wager.is_expired(now) {
            return Err(self.reject(StateError::DeadlinePassed {
                wager_id: wager_id.clone(),
                deadline: wager.deadline,
            }));
        }
        if patch.is_empty() {
            return Ok(wager);
        }

        patch
            .apply(&mut wager, now, self.config.stake_floor)
            .map_err(|e| self.reject(e))?;
        self.save(&wager, version)?;

        info!(wager_id = %wager_id, actor = %actor, "Wager edited");
        Ok(wager)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Payout for a settled wager, from cache or recomputed from the ledger.
    pub fn payout(&self, wager_id: &WagerId) -> Result<Arc<PayoutResult>, WagerError> {
        if let Some(cached) = self.cache.get(wager_id) {
            debug!(wager_id = %wager_id, "Payout cache hit");
            return Ok(cached);
        }

        let wager = self.store.load_wager(wager_id)?.value;
        if !wager.status.is_terminal() {
            return Err(self.reject(StateError::NotSettled {
                wager_id: wager_id.clone(),
                status: wager.status,
            }));
        }

        let stakes = self.store.load_stakes_for_wager(wager_id)?;
        // A settled wager that no longer settles is an invariant violation.
        let result = engine::settle(&wager, &stakes).map_err(|e| self.fault(e.into()))?;
        self.verify(&result)?;

        Ok(if self.config.cache_payouts {
            self.cache.get_or_insert(result)
        } else {
            Arc::new(result)
        })
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn authorize(
        &self,
        actor: &ParticipantId,
        wager: &Wager,
        action: ModeratorAction,
    ) -> Result<(), WagerError> {
        if self.auth.can_moderate(actor, &wager.group_id, action) {
            return Ok(());
        }
        Err(self.reject(AuthorizationError::NotModerator {
            actor: actor.clone(),
            group: wager.group_id.clone(),
            action,
        }))
    }

    fn verify(&self, result: &PayoutResult) -> Result<(), WagerError> {
        if !self.config.verify_conservation {
            return Ok(());
        }
        result
            .verify_conservation(self.config.conservation_tolerance)
            .map_err(|e| self.fault(e.into()))
    }

    fn save(&self, wager: &Wager, version: u64) -> Result<u64, WagerError> {
        match self.store.save_wager(wager, version) {
            Ok(v) => Ok(v),
            Err(StoreError::WriteConflict { .. }) => {
                let current = self.store.load_wager(&wager.id)?.value;
                if current.status.is_terminal() {
                    return Err(self.reject(StateError::AlreadySettled {
                        wager_id: wager.id.clone(),
                    }));
                }
                if current.status.is_closed() {
                    let e = if wager.status.is_closed() {
                        StateError::AlreadyClosed {
                            wager_id: wager.id.clone(),
                        }
                    } else {
                        StateError::NotOpen {
                            wager_id: wager.id.clone(),
                            status: current.status,
                        }
                    };
                    return Err(self.reject(e));
                }
                Err(self.save_conflict(&wager.id, version))
            }
            Err(e) => Err(self.fault(e.into())),
        }
    }

    fn save_conflict(&self, wager_id: &WagerId, expected: u64) -> WagerError {
        let actual = self
            .store
            .load_wager(wager_id)
            .map(|v| v.version)
            .unwrap_or(expected);
        self.fault(
            StoreError::WriteConflict {
                wager_id: wager_id.clone(),
                expected,
                actual,
            }
            .into(),
        )
    }

    /// Log a caller-side rejection and pass it through.
    fn reject(&self, e: impl Into<WagerError>) -> WagerError {
        let e = e.into();
        warn!(kind = e.kind(), error = %e, "Wager operation rejected");
        e
    }

    /// Log a server-side fault and pass it through.
    fn fault(&self, e: WagerError) -> WagerError {
        error!(kind = e.kind(), error = %e, "Wager invariant violated");
        e
    }
}
