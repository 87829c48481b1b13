//! Stake Ledger
//!
//! Authoritative record of who staked what on which option. The engine reads
//! the ledger's snapshot and never mutates it.
//!
//! # Preconditions (checked in order, nothing silently corrected)
//!
//! 1. Wager status is `open` and the deadline has not passed (`StateError`)
//! 2. Participant belongs to the wager's group (`AuthorizationError`)
//! 3. Option ids are recognized and distinct (`ValidationError`)
//! 4. Each recorded amount lies in `[max(floor, min), max(floor, max)]` (`ValidationError`)
//!
//! # Write semantics
//!
//! - Single vote: one live record per participant; a new stake replaces it.
//! - Multi vote: one record per chosen option. `place_multi_stake` splits a
//!   total evenly across a selection and replaces the previous selection.

use crate::config::SettlementConfig;
use crate::wager::collaborators::{GroupDirectory, WagerStore};
use crate::wager::error::{AuthorizationError, StateError, ValidationError, WagerError};
use crate::wager::locks::LockRegistry;
use crate::wager::types::{
    OptionId, ParticipantId, StakeRecord, VotingMode, Wager, WagerId, WagerStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct StakeLedger {
    store: Arc<dyn WagerStore>,
    groups: Arc<dyn GroupDirectory>,
    locks: Arc<LockRegistry>,
    stake_floor: Decimal,
}

impl StakeLedger {
    pub fn new(
        store: Arc<dyn WagerStore>,
        groups: Arc<dyn GroupDirectory>,
        locks: Arc<LockRegistry>,
        config: &SettlementConfig,
    ) -> Self {
        Self {
            store,
            groups,
            locks,
            stake_floor: config.stake_floor,
        }
    }

    /// Stake `amount` on one option.
    pub fn place_stake(
        &self,
        participant: &ParticipantId,
        display_name: &str,
        wager_id: &WagerId,
        option_id: &OptionId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<StakeRecord, WagerError> {
        self.locks.with_stake_slot(wager_id, participant, || {
            self.write_stake(participant, display_name, wager_id, option_id, amount, now)
        })
    }

    fn write_stake(
        &self,
        participant: &ParticipantId,
        display_name: &str,
        wager_id: &WagerId,
        option_id: &OptionId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<StakeRecord, WagerError> {
        let wager = self.store.load_wager(wager_id)?.value;
        self.check_accepting(&wager, participant, now)?;
        if !wager.has_option(option_id) {
            return Err(ValidationError::UnknownOption {
                option_id: option_id.clone(),
            }
            .into());
        }
        self.check_amount(&wager, amount)?;

        let record = StakeRecord {
            wager_id: wager_id.clone(),
            participant_id: participant.clone(),
            display_name: display_name.to_string(),
            option_id: option_id.clone(),
            amount,
            placed_at: now,
        };

        match wager.voting_mode {
            VotingMode::Single => {
                self.store
                    .replace_stakes(wager_id, participant, std::slice::from_ref(&record))?
            }
            VotingMode::Multi { .. } => self.store.upsert_stake(&record)?,
        }

        debug!(
            wager_id = %wager_id,
            participant = %participant,
            option = %option_id,
            amount = %amount,
            "Stake recorded"
        );
        Ok(record)
    }

    /// Split `total` evenly across `option_ids` on a multi-vote wager.
    ///
    /// The last option absorbs the sub-unit remainder, so the records always
    /// sum to exactly `total`. Replaces the participant's previous selection.
    pub fn place_multi_stake(
        &self,
        participant: &ParticipantId,
        display_name: &str,
        wager_id: &WagerId,
        option_ids: &[OptionId],
        total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<StakeRecord>, WagerError> {
        self.locks.with_stake_slot(wager_id, participant, || {
            self.write_split(participant, display_name, wager_id, option_ids, total, now)
        })
    }

    fn write_split(
        &self,
        participant: &ParticipantId,
        display_name: &str,
        wager_id: &WagerId,
        option_ids: &[OptionId],
        total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<StakeRecord>, WagerError> {
        let wager = self.store.load_wager(wager_id)?.value;
        if !wager.voting_mode.is_multi() {
            return Err(ValidationError::WrongVotingMode { expected: "multi-vote" }.into());
        }
        self.check_accepting(&wager, participant, now)?;

        if option_ids.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        let mut seen = BTreeSet::new();
        for option_id in option_ids {
            if !wager.has_option(option_id) {
                return Err(ValidationError::UnknownOption {
                    option_id: option_id.clone(),
                }
                .into());
            }
            if !seen.insert(option_id) {
                return Err(ValidationError::DuplicateOption {
                    option_id: option_id.clone(),
                }
                .into());
            }
        }

        let amounts = split_evenly(total, option_ids.len());
        for amount in &amounts {
            self.check_amount(&wager, *amount)?;
        }

        let records: Vec<StakeRecord> = option_ids
            .iter()
            .zip(amounts)
            .map(|(option_id, amount)| StakeRecord {
                wager_id: wager_id.clone(),
                participant_id: participant.clone(),
                display_name: display_name.to_string(),
                option_id: option_id.clone(),
                amount,
                placed_at: now,
            })
            .collect();

        self.store.replace_stakes(wager_id, participant, &records)?;

        debug!(
            wager_id = %wager_id,
            participant = %participant,
            options = records.len(),
            total = %total,
            "Multi-option stake recorded"
        );
        Ok(records)
    }

    /// Every record on the wager, for engine consumption.
    pub fn stakes_for_wager(&self, wager_id: &WagerId) -> Result<Vec<StakeRecord>, WagerError> {
        Ok(self.store.load_stakes_for_wager(wager_id)?)
    }

    fn check_accepting(
        &self,
        wager: &Wager,
        participant: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<(), WagerError> {
        if wager.status != WagerStatus::Open {
            return Err(StateError::NotOpen {
                wager_id: wager.id.clone(),
                status: wager.status,
            }
            .into());
        }
        if wager.is_expired(now) {
            return Err(StateError::DeadlinePassed {
                wager_id: wager.id.clone(),
                deadline: wager.deadline,
            }
            .into());
        }
        if !self.groups.is_member(participant, &wager.group_id) {
            return Err(AuthorizationError::NotGroupMember {
                participant: participant.clone(),
                group: wager.group_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn check_amount(&self, wager: &Wager, amount: Decimal) -> Result<(), ValidationError> {
        let (min, max) = wager.stake_bounds(self.stake_floor);
        if amount < min || amount > max {
            return Err(ValidationError::StakeOutOfBounds { amount, min, max });
        }
        Ok(())
    }
}

/// Split `total` into `parts` near-equal amounts summing exactly to `total`.
fn split_evenly(total: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let share = total / Decimal::from(parts);
    let mut amounts = vec![share; parts];
    let assigned: Decimal = amounts[..parts - 1].iter().sum();
    amounts[parts - 1] = total - assigned;
    amounts
}
