//! Wager Error Taxonomy
//!
//! - `ConfigurationError`: wager cannot be settled as configured (no outcome,
//!   unknown winning option, stake snapshot inconsistent with the wager).
//! - `StateError`: transition not allowed from the current status.
//! - `ValidationError`: caller input rejected before any write.
//! - `AuthorizationError`: caller lacks the required role.
//! - `StoreError`: persistence collaborator failure.

use crate::wager::collaborators::ModeratorAction;
use crate::wager::types::{GroupId, OptionId, ParticipantId, WagerId, WagerStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// No outcome declared (or an empty winning set).
    NoWinningOption { wager_id: WagerId },
    /// Outcome names an option the wager does not have, or does not fit the voting mode.
    InvalidWinningOption { wager_id: WagerId, reason: String },
    /// Stake snapshot does not belong to this wager as configured.
    InconsistentStakes { wager_id: WagerId, reason: String },
    /// Amounts exceeded decimal range.
    AmountOverflow { wager_id: WagerId },
    /// Payout result failed its conservation check.
    ConservationViolated { wager_id: WagerId, detail: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWinningOption { wager_id } => {
                write!(f, "No winning option set for wager {}", wager_id)
            }
            Self::InvalidWinningOption { wager_id, reason } => {
                write!(f, "Invalid winning option for wager {}: {}", wager_id, reason)
            }
            Self::InconsistentStakes { wager_id, reason } => {
                write!(f, "Inconsistent stakes for wager {}: {}", wager_id, reason)
            }
            Self::AmountOverflow { wager_id } => {
                write!(f, "Amount overflow while settling wager {}", wager_id)
            }
            Self::ConservationViolated { wager_id, detail } => {
                write!(f, "Conservation violated for wager {}: {}", wager_id, detail)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    AlreadySettled { wager_id: WagerId },
    AlreadyClosed { wager_id: WagerId },
    NotOpen { wager_id: WagerId, status: WagerStatus },
    DeadlinePassed { wager_id: WagerId, deadline: DateTime<Utc> },
    NotSettled { wager_id: WagerId, status: WagerStatus },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySettled { wager_id } => write!(f, "Wager {} is already settled", wager_id),
            Self::AlreadyClosed { wager_id } => write!(f, "Wager {} is already closed", wager_id),
            Self::NotOpen { wager_id, status } => {
                write!(f, "Wager {} is not open (status: {})", wager_id, status)
            }
            Self::DeadlinePassed { wager_id, deadline } => {
                write!(f, "Wager {} closed for stakes at {}", wager_id, deadline.to_rfc3339())
            }
            Self::NotSettled { wager_id, status } => {
                write!(f, "Wager {} has not been settled (status: {})", wager_id, status)
            }
        }
    }
}

impl std::error::Error for StateError {}

// =============================================================================
// VALIDATION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    StakeOutOfBounds { amount: Decimal, min: Decimal, max: Decimal },
    UnknownOption { option_id: OptionId },
    DuplicateOption { option_id: OptionId },
    EmptySelection,
    /// Operation requires a different voting mode.
    WrongVotingMode { expected: &'static str },
    MissingField { field: &'static str },
    TooFewOptions { count: usize },
    InvalidStakeBounds { min: Decimal, max: Decimal },
    DeadlineInPast { deadline: DateTime<Utc> },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StakeOutOfBounds { amount, min, max } => {
                write!(f, "Stake {} must be between {} and {}", amount, min, max)
            }
            Self::UnknownOption { option_id } => write!(f, "Unknown option {}", option_id),
            Self::DuplicateOption { option_id } => write!(f, "Option {} listed twice", option_id),
            Self::EmptySelection => write!(f, "At least one option must be selected"),
            Self::WrongVotingMode { expected } => {
                write!(f, "Operation requires a {} wager", expected)
            }
            Self::MissingField { field } => write!(f, "Missing required field: {}", field),
            Self::TooFewOptions { count } => {
                write!(f, "A wager needs at least 2 options, got {}", count)
            }
            Self::InvalidStakeBounds { min, max } => {
                write!(f, "Invalid stake bounds: min {} max {}", min, max)
            }
            Self::DeadlineInPast { deadline } => {
                write!(f, "Deadline {} is not in the future", deadline.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationError {
    NotModerator {
        actor: ParticipantId,
        group: GroupId,
        action: ModeratorAction,
    },
    NotGroupMember { participant: ParticipantId, group: GroupId },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotModerator { actor, group, action } => write!(
                f,
                "{} may not {} wagers in group {}",
                actor,
                action.as_str(),
                group
            ),
            Self::NotGroupMember { participant, group } => {
                write!(f, "{} is not a member of group {}", participant, group)
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound { wager_id: WagerId },
    AlreadyExists { wager_id: WagerId },
    /// Compare-and-swap failed: someone saved the wager first.
    WriteConflict { wager_id: WagerId, expected: u64, actual: u64 },
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { wager_id } => write!(f, "Wager {} not found", wager_id),
            Self::AlreadyExists { wager_id } => write!(f, "Wager {} already exists", wager_id),
            Self::WriteConflict { wager_id, expected, actual } => write!(
                f,
                "Write conflict on wager {}: expected version {}, found {}",
                wager_id, expected, actual
            ),
            Self::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// =============================================================================
// WAGER ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WagerError {
    Configuration(ConfigurationError),
    State(StateError),
    Validation(ValidationError),
    Authorization(AuthorizationError),
    Store(StoreError),
}

impl WagerError {
    /// Whether the error describes a caller mistake rather than a server fault.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::State(_) | Self::Validation(_) | Self::Authorization(_) => true,
            Self::Store(StoreError::NotFound { .. }) => true,
            Self::Configuration(_) | Self::Store(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::State(_) => "state",
            Self::Validation(_) => "validation",
            Self::Authorization(_) => "authorization",
            Self::Store(_) => "store",
        }
    }
}

impl fmt::Display for WagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => e.fmt(f),
            Self::State(e) => e.fmt(f),
            Self::Validation(e) => e.fmt(f),
            Self::Authorization(e) => e.fmt(f),
            Self::Store(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for WagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::State(e) => Some(e),
            Self::Validation(e) => Some(e),
            Self::Authorization(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for WagerError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<StateError> for WagerError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<ValidationError> for WagerError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<AuthorizationError> for WagerError {
    fn from(e: AuthorizationError) -> Self {
        Self::Authorization(e)
    }
}

impl From<StoreError> for WagerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_split() {
        let state: WagerError = StateError::AlreadySettled { wager_id: "w".into() }.into();
        assert!(state.is_user_facing());

        let config: WagerError = ConfigurationError::NoWinningOption { wager_id: "w".into() }.into();
        assert!(!config.is_user_facing());
        assert_eq!(config.to_string(), "No winning option set for wager w");

        let conflict: WagerError = StoreError::WriteConflict {
            wager_id: "w".into(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(!conflict.is_user_facing());
        assert_eq!(conflict.kind(), "store");
    }
}
