//! In-memory collaborators: a versioned wager store and a group roster.

use crate::wager::collaborators::{Authorizer, GroupDirectory, ModeratorAction, Versioned, WagerStore};
use crate::wager::error::StoreError;
use crate::wager::types::{GroupId, OptionId, ParticipantId, StakeRecord, Wager, WagerId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

type StakeKey = (WagerId, ParticipantId, OptionId);

/// Wager store backed by maps. `save_wager` is a true compare-and-swap.
#[derive(Default)]
pub struct InMemoryWagerStore {
    wagers: RwLock<HashMap<WagerId, Versioned<Wager>>>,
    stakes: RwLock<BTreeMap<StakeKey, StakeRecord>>,
}

impl InMemoryWagerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wager_count(&self) -> usize {
        self.wagers.read().len()
    }

    pub fn stake_count(&self) -> usize {
        self.stakes.read().len()
    }
}

impl WagerStore for InMemoryWagerStore {
    fn load_wager(&self, id: &WagerId) -> Result<Versioned<Wager>, StoreError> {
        self.wagers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { wager_id: id.clone() })
    }

    fn insert_wager(&self, wager: &Wager) -> Result<u64, StoreError> {
        let mut wagers = self.wagers.write();
        if wagers.contains_key(&wager.id) {
            return Err(StoreError::AlreadyExists {
                wager_id: wager.id.clone(),
            });
        }
        wagers.insert(
            wager.id.clone(),
            Versioned {
                value: wager.clone(),
                version: 1,
            },
        );
        Ok(1)
    }

    fn save_wager(&self, wager: &Wager, expected_version: u64) -> Result<u64, StoreError> {
        let mut wagers = self.wagers.write();
        let stored = wagers
            .get_mut(&wager.id)
            .ok_or_else(|| StoreError::NotFound {
                wager_id: wager.id.clone(),
            })?;
        if stored.version != expected_version {
            return Err(StoreError::WriteConflict {
                wager_id: wager.id.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.value = wager.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    fn load_stakes_for_wager(&self, id: &WagerId) -> Result<Vec<StakeRecord>, StoreError> {
        Ok(self
            .stakes
            .read()
            .values()
            .filter(|r| &r.wager_id == id)
            .cloned()
            .collect())
    }

    fn upsert_stake(&self, record: &StakeRecord) -> Result<(), StoreError> {
        let key = (
            record.wager_id.clone(),
            record.participant_id.clone(),
            record.option_id.clone(),
        );
        self.stakes.write().insert(key, record.clone());
        Ok(())
    }

    fn replace_stakes(
        &self,
        wager_id: &WagerId,
        participant: &ParticipantId,
        records: &[StakeRecord],
    ) -> Result<(), StoreError> {
        let mut stakes = self.stakes.write();
        stakes.retain(|(w, p, _), _| !(w == wager_id && p == participant));
        for record in records {
            let key = (
                record.wager_id.clone(),
                record.participant_id.clone(),
                record.option_id.clone(),
            );
            stakes.insert(key, record.clone());
        }
        Ok(())
    }
}

// =============================================================================
// GROUP ROSTER
// =============================================================================

#[derive(Debug, Default)]
struct GroupRoles {
    owner: Option<ParticipantId>,
    moderators: HashSet<ParticipantId>,
    members: HashSet<ParticipantId>,
}

/// Static group membership and roles. Owners and moderators are members too.
#[derive(Debug, Default)]
pub struct GroupRoster {
    groups: RwLock<HashMap<GroupId, GroupRoles>>,
}

impl GroupRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(self, group: impl Into<GroupId>, owner: impl Into<ParticipantId>) -> Self {
        let owner = owner.into();
        {
            let mut groups = self.groups.write();
            let roles = groups.entry(group.into()).or_default();
            roles.members.insert(owner.clone());
            roles.owner = Some(owner);
        }
        self
    }

    pub fn with_moderator(self, group: impl Into<GroupId>, moderator: impl Into<ParticipantId>) -> Self {
        self.add_moderator(&group.into(), moderator.into());
        self
    }

    pub fn with_member(self, group: impl Into<GroupId>, member: impl Into<ParticipantId>) -> Self {
        self.add_member(&group.into(), member.into());
        self
    }

    pub fn add_member(&self, group: &GroupId, member: ParticipantId) {
        self.groups
            .write()
            .entry(group.clone())
            .or_default()
            .members
            .insert(member);
    }

    pub fn add_moderator(&self, group: &GroupId, moderator: ParticipantId) {
        let mut groups = self.groups.write();
        let roles = groups.entry(group.clone()).or_default();
        roles.members.insert(moderator.clone());
        roles.moderators.insert(moderator);
    }
}

impl Authorizer for GroupRoster {
    fn can_moderate(&self, actor: &ParticipantId, group: &GroupId, _action: ModeratorAction) -> bool {
        self.groups
            .read()
            .get(group)
            .map(|roles| roles.owner.as_ref() == Some(actor) || roles.moderators.contains(actor))
            .unwrap_or(false)
    }
}

impl GroupDirectory for GroupRoster {
    fn is_member(&self, participant: &ParticipantId, group: &GroupId) -> bool {
        self.groups
            .read()
            .get(group)
            .map(|roles| roles.members.contains(participant))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wager::types::{VotingMode, WagerOption, WagerStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn wager(id: &str) -> Wager {
        let now = Utc::now();
        Wager {
            id: WagerId::from(id),
            group_id: GroupId::from("g"),
            title: "t".to_string(),
            description: String::new(),
            voting_mode: VotingMode::Single,
            options: vec![WagerOption::new("a", "A"), WagerOption::new("b", "B")],
            outcome: None,
            status: WagerStatus::Open,
            deadline: now,
            min_stake: dec!(1),
            max_stake: dec!(10),
            created_by: ParticipantId::from("owner"),
            created_at: now,
            closed_at: None,
            settled_at: None,
        }
    }

    #[test]
    fn test_save_is_compare_and_swap() {
        let store = InMemoryWagerStore::new();
        let mut w = wager("w1");
        assert_eq!(store.insert_wager(&w).unwrap(), 1);

        w.status = WagerStatus::Closed;
        assert_eq!(store.save_wager(&w, 1).unwrap(), 2);

        let stale = store.save_wager(&w, 1);
        assert_eq!(
            stale,
            Err(StoreError::WriteConflict {
                wager_id: WagerId::from("w1"),
                expected: 1,
                actual: 2,
            })
        );
        assert!(matches!(
            store.insert_wager(&w),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_roster_roles() {
        let roster = GroupRoster::new()
            .with_owner("g", "owner")
            .with_moderator("g", "mod")
            .with_member("g", "alice");
        let g = GroupId::from("g");

        assert!(roster.can_moderate(&"owner".into(), &g, ModeratorAction::Settle));
        assert!(roster.can_moderate(&"mod".into(), &g, ModeratorAction::Close));
        assert!(!roster.can_moderate(&"alice".into(), &g, ModeratorAction::Close));
        assert!(roster.is_member(&"mod".into(), &g));
        assert!(!roster.is_member(&"bob".into(), &g));
        assert!(!roster.is_member(&"alice".into(), &GroupId::from("other")));
    }
}
