//! Group Wager Settlement Library
//!
//! Exposes the stake ledger, wager lifecycle, and settlement engine for use
//! by the request layer, binaries, and tests.

pub mod config;
pub mod wager;

pub use config::SettlementConfig;
pub use wager::{settle, PayoutResult, StakeLedger, WagerError, WagerLifecycle};
