//! Wager Data Model
//!
//! Closed, tagged representation of a wager, its options, the declared outcome,
//! and the stake records placed against it. Option identifiers are assigned at
//! creation and never derived from list position.

use crate::wager::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Unique wager identifier.
    WagerId
);
string_id!(
    /// Group that owns a wager.
    GroupId
);
string_id!(
    /// Member identity (the authenticated subject).
    ParticipantId
);
string_id!(
    /// Stable option identifier, unique within its wager.
    OptionId
);

impl WagerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// =============================================================================
// MODES
// =============================================================================

/// How multi-vote participants are judged against the winning set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// Participant's option set must equal the winning set.
    ExactMatch,
    /// Any overlap with the winning set wins; only the winning portion counts.
    PartialMatch,
}

/// Voting mode. Multi-vote always carries its settlement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VotingMode {
    Single,
    Multi { settlement: SettlementMode },
}

impl VotingMode {
    pub fn is_multi(&self) -> bool {
        matches!(self, VotingMode::Multi { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMode::Single => "single",
            VotingMode::Multi { settlement: SettlementMode::ExactMatch } => "multi/exact_match",
            VotingMode::Multi { settlement: SettlementMode::PartialMatch } => "multi/partial_match",
        }
    }
}

// =============================================================================
// OPTIONS & OUTCOME
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerOption {
    pub id: OptionId,
    pub text: String,
}

impl WagerOption {
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Declared outcome of a wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum Outcome {
    /// One winning option (single-vote wagers).
    Single(OptionId),
    /// Set of winning options (multi-vote wagers).
    Multi(BTreeSet<OptionId>),
}

impl Outcome {
    pub fn multi<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OptionId>,
    {
        Outcome::Multi(ids.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Wager status.
///
/// `Pending` exists only in legacy data. No transition produces it; it is
/// read as a synonym for `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Open,
    Closed,
    Pending,
    Settled,
}

impl WagerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WagerStatus::Settled)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, WagerStatus::Closed | WagerStatus::Pending)
    }

    pub fn can_settle(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WagerStatus::Open => "open",
            WagerStatus::Closed => "closed",
            WagerStatus::Pending => "pending",
            WagerStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WAGER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: WagerId,
    pub group_id: GroupId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub voting_mode: VotingMode,
    pub options: Vec<WagerOption>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    pub status: WagerStatus,
    pub deadline: DateTime<Utc>,
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    pub created_by: ParticipantId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Wager {
    pub fn option(&self, id: &OptionId) -> Option<&WagerOption> {
        self.options.iter().find(|o| &o.id == id)
    }

    pub fn has_option(&self, id: &OptionId) -> bool {
        self.option(id).is_some()
    }

    /// Inclusive stake bounds with `floor` applied to both ends.
    pub fn stake_bounds(&self, floor: Decimal) -> (Decimal, Decimal) {
        (self.min_stake.max(floor), self.max_stake.max(floor))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// Moderator input for a new wager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerDraft {
    pub group_id: GroupId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub voting_mode: VotingMode,
    pub options: Vec<WagerOption>,
    pub deadline: DateTime<Utc>,
    pub min_stake: Decimal,
    pub max_stake: Decimal,
}

impl WagerDraft {
    pub fn validate(&self, now: DateTime<Utc>, floor: Decimal) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "title" });
        }
        validate_options(&self.options)?;
        validate_bounds(self.min_stake, self.max_stake, floor)?;
        if self.deadline <= now {
            return Err(ValidationError::DeadlineInPast { deadline: self.deadline });
        }
        Ok(())
    }

    pub fn into_wager(
        self,
        id: WagerId,
        created_by: ParticipantId,
        now: DateTime<Utc>,
    ) -> Wager {
        Wager {
            id,
            group_id: self.group_id,
            title: self.title,
            description: self.description,
            voting_mode: self.voting_mode,
            options: self.options,
            outcome: None,
            status: WagerStatus::Open,
            deadline: self.deadline,
            min_stake: self.min_stake,
            max_stake: self.max_stake,
            created_by,
            created_at: now,
            closed_at: None,
            settled_at: None,
        }
    }
}

/// Editable metadata. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WagerPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub min_stake: Option<Decimal>,
    pub max_stake: Option<Decimal>,
}

impl WagerPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.min_stake.is_none()
            && self.max_stake.is_none()
    }

    /// Apply to `wager`, re-validating every touched field.
    pub fn apply(
        self,
        wager: &mut Wager,
        now: DateTime<Utc>,
        floor: Decimal,
    ) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::MissingField { field: "title" });
            }
        }
        if let Some(deadline) = self.deadline {
            if deadline <= now {
                return Err(ValidationError::DeadlineInPast { deadline });
            }
        }
        let min_stake = self.min_stake.unwrap_or(wager.min_stake);
        let max_stake = self.max_stake.unwrap_or(wager.max_stake);
        validate_bounds(min_stake, max_stake, floor)?;

        if let Some(title) = self.title {
            wager.title = title;
        }
        if let Some(description) = self.description {
            wager.description = description;
        }
        if let Some(deadline) = self.deadline {
            wager.deadline = deadline;
        }
        wager.min_stake = min_stake;
        wager.max_stake = max_stake;
        Ok(())
    }
}

fn validate_options(options: &[WagerOption]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(ValidationError::TooFewOptions { count: options.len() });
    }
    let mut seen = BTreeSet::new();
    for option in options {
        if option.id.as_str().is_empty() {
            return Err(ValidationError::MissingField { field: "option.id" });
        }
        if !seen.insert(&option.id) {
            return Err(ValidationError::DuplicateOption {
                option_id: option.id.clone(),
            });
        }
    }
    Ok(())
}

fn validate_bounds(min: Decimal, max: Decimal, floor: Decimal) -> Result<(), ValidationError> {
    if min.is_sign_negative() || max.is_sign_negative() || min.max(floor) > max.max(floor) {
        return Err(ValidationError::InvalidStakeBounds { min, max });
    }
    Ok(())
}

// =============================================================================
// STAKE RECORD
// =============================================================================

/// One ledger row per (participant, wager, option).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub wager_id: WagerId,
    pub participant_id: ParticipantId,
    /// Display name captured when the stake was placed.
    pub display_name: String,
    pub option_id: OptionId,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}
