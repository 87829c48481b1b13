//! Group Wager Settlement Core
//!
//! Stake ledger, wager lifecycle, and the settlement engine for group bets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        WagerLifecycle                           │
//! │  (open → closed → settled, authorization, CAS on wager version) │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//! ┌─────────────┐        ┌─────────────┐        ┌─────────────┐
//! │ StakeLedger │───────▶│   settle()  │───────▶│ PayoutCache │
//! │ (snapshot)  │        │  (pure fn)  │        │ (derived)   │
//! └─────────────┘        └─────────────┘        └─────────────┘
//!        │                                              │
//!        ▼                                              ▼
//! ┌─────────────┐                               ┌─────────────┐
//! │ WagerStore  │                               │ ProfitReport│
//! │ (external)  │                               │ (reporting) │
//! └─────────────┘                               └─────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Single formula**: every payout figure comes from [`settle`]
//! - **Determinism**: identical wager + stakes give identical results
//! - **Conservation**: payouts sum to the pool; refunds list no losers
//! - **Exactly-once**: settlement persists through a version compare-and-swap
//! - **Frozen snapshot**: no stake is accepted once a wager leaves `open`

pub mod cache;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod memory;
pub mod payout;
pub mod reporting;
pub mod types;

#[cfg(test)]
mod ledger_tests;

pub use cache::PayoutCache;
pub use collaborators::{Authorizer, GroupDirectory, ModeratorAction, Versioned, WagerStore};
pub use engine::{resolve_outcome, settle};
pub use error::{
    AuthorizationError, ConfigurationError, StateError, StoreError, ValidationError, WagerError,
};
pub use ledger::StakeLedger;
pub use lifecycle::WagerLifecycle;
pub use locks::LockRegistry;
pub use memory::{GroupRoster, InMemoryWagerStore};
pub use payout::{LoserLoss, PayoutResult, SettlementRule, WinnerPayout, WinningOption};
pub use reporting::{ParticipantProfit, ProfitReport};
pub use types::{
    GroupId, OptionId, Outcome, ParticipantId, SettlementMode, StakeRecord, VotingMode, Wager,
    WagerDraft, WagerId, WagerOption, WagerPatch, WagerStatus,
};
