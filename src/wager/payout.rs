//! Payout Result
//!
//! Output of the settlement engine. The shape is the same for every rule
//! variant: totals, winning options, winners, losers, and a refund flag.
//!
//! Figures are kept at full decimal precision. `rounded` produces the
//! presentation copy; nothing inside the engine rounds.

use crate::wager::error::ConfigurationError;
use crate::wager::types::{OptionId, ParticipantId, WagerId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Which formula produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementRule {
    SingleVote,
    ExactMatch,
    PartialMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningOption {
    pub id: OptionId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerPayout {
    pub participant_id: ParticipantId,
    pub display_name: String,
    /// Stake that won (the whole stake for refunds).
    pub stake: Decimal,
    /// Stake on non-winning options, folded into the losing pool (partial match only).
    pub forfeited: Decimal,
    pub payout: Decimal,
}

impl WinnerPayout {
    /// Share of the losing pool received on top of the winning stake.
    pub fn redistributed(&self) -> Decimal {
        self.payout - self.stake
    }

    /// Net result against everything the participant staked.
    pub fn net(&self) -> Decimal {
        self.payout - self.stake - self.forfeited
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoserLoss {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub stake: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutResult {
    pub wager_id: WagerId,
    pub rule: SettlementRule,
    /// Sum of every stake on the wager.
    pub total_pool: Decimal,
    /// Winners' winning stake. Zero for refunds.
    pub winning_pool: Decimal,
    /// Everything redistributed to winners: pure losers plus `forfeited_pool`.
    pub losing_pool: Decimal,
    /// Winners' stake on non-winning options.
    pub forfeited_pool: Decimal,
    pub winning_options: Vec<WinningOption>,
    pub winners: Vec<WinnerPayout>,
    pub losers: Vec<LoserLoss>,
    pub is_refund: bool,
}

impl PayoutResult {
    pub fn total_paid_out(&self) -> Decimal {
        self.winners.iter().map(|w| w.payout).sum()
    }

    pub fn total_lost(&self) -> Decimal {
        self.losers.iter().map(|l| l.stake).sum()
    }

    pub fn winner(&self, participant: &ParticipantId) -> Option<&WinnerPayout> {
        self.winners.iter().find(|w| &w.participant_id == participant)
    }

    pub fn loser(&self, participant: &ParticipantId) -> Option<&LoserLoss> {
        self.losers.iter().find(|l| &l.participant_id == participant)
    }

    /// Check that money in equals money out.
    ///
    /// - paid out to winners == total pool (when anyone staked)
    /// - winners' stake + forfeited + losers' stake == total pool
    /// - refunds carry no losers
    pub fn verify_conservation(&self, tolerance: Decimal) -> Result<(), ConfigurationError> {
        let violated = |detail: String| ConfigurationError::ConservationViolated {
            wager_id: self.wager_id.clone(),
            detail,
        };

        let paid = self.total_paid_out();
        if (paid - self.total_pool).abs() > tolerance {
            return Err(violated(format!(
                "paid out {} but pool is {}",
                paid, self.total_pool
            )));
        }

        let accounted = self.winners.iter().map(|w| w.stake).sum::<Decimal>()
            + self.forfeited_pool
            + self.total_lost();
        if (accounted - self.total_pool).abs() > tolerance {
            return Err(violated(format!(
                "stakes account for {} but pool is {}",
                accounted, self.total_pool
            )));
        }

        if self.is_refund && !self.losers.is_empty() {
            return Err(violated(format!(
                "refund lists {} losers",
                self.losers.len()
            )));
        }

        Ok(())
    }

    /// Presentation copy rounded to `decimals` places, midpoint away from zero.
    pub fn rounded(&self, decimals: u32) -> PayoutResult {
        let round = |v: Decimal| v.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
        PayoutResult {
            total_pool: round(self.total_pool),
            winning_pool: round(self.winning_pool),
            losing_pool: round(self.losing_pool),
            forfeited_pool: round(self.forfeited_pool),
            winners: self
                .winners
                .iter()
                .map(|w| WinnerPayout {
                    stake: round(w.stake),
                    forfeited: round(w.forfeited),
                    payout: round(w.payout),
                    ..w.clone()
                })
                .collect(),
            losers: self
                .losers
                .iter()
                .map(|l| LoserLoss {
                    stake: round(l.stake),
                    ..l.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}
