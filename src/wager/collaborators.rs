//! Collaborator contracts consumed by the ledger and lifecycle.
//!
//! Storage, authorization, and group membership live outside this crate. The
//! core only depends on these traits; `memory` provides in-process versions.

use crate::wager::error::StoreError;
use crate::wager::types::{GroupId, ParticipantId, StakeRecord, Wager, WagerId};
use serde::{Deserialize, Serialize};

/// Mutating lifecycle actions that require owner-or-moderator rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorAction {
    Create,
    Edit,
    Close,
    Settle,
}

impl ModeratorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Close => "close",
            Self::Settle => "settle",
        }
    }
}

/// Owner-or-moderator check.
pub trait Authorizer: Send + Sync {
    fn can_moderate(&self, actor: &ParticipantId, group: &GroupId, action: ModeratorAction) -> bool;
}

pub trait GroupDirectory: Send + Sync {
    fn is_member(&self, participant: &ParticipantId, group: &GroupId) -> bool;
}

/// A stored value with its optimistic concurrency token.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Persistence contract.
///
/// `save_wager` must be a compare-and-swap on `expected_version`: it fails with
/// `StoreError::WriteConflict` when the stored version differs, and returns the
/// new version otherwise. Stake records are keyed by (wager, participant, option).
pub trait WagerStore: Send + Sync {
    fn load_wager(&self, id: &WagerId) -> Result<Versioned<Wager>, StoreError>;

    fn insert_wager(&self, wager: &Wager) -> Result<u64, StoreError>;

    fn save_wager(&self, wager: &Wager, expected_version: u64) -> Result<u64, StoreError>;

    fn load_stakes_for_wager(&self, id: &WagerId) -> Result<Vec<StakeRecord>, StoreError>;

    /// Insert or replace the record for its (wager, participant, option) key.
    fn upsert_stake(&self, record: &StakeRecord) -> Result<(), StoreError>;

    /// Atomically replace every record the participant holds on the wager.
    fn replace_stakes(
        &self,
        wager_id: &WagerId,
        participant: &ParticipantId,
        records: &[StakeRecord],
    ) -> Result<(), StoreError>;
}
