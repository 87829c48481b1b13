//! Aggregation reporters.
//!
//! Per-participant profit across settled wagers, built only from engine
//! output. Nothing here re-derives the payout formula.

use crate::wager::payout::PayoutResult;
use crate::wager::types::{ParticipantId, WagerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantProfit {
    pub display_name: String,
    pub wagers: usize,
    pub wins: usize,
    pub refunds: usize,
    pub staked: Decimal,
    pub paid_out: Decimal,
}

impl ParticipantProfit {
    pub fn net(&self) -> Decimal {
        self.paid_out - self.staked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitReport {
    pub wagers: Vec<WagerId>,
    pub volume: Decimal,
    pub participants: BTreeMap<ParticipantId, ParticipantProfit>,
}

impl ProfitReport {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a PayoutResult>) -> Self {
        let mut report = ProfitReport::default();
        for result in results {
            report.add(result);
        }
        report
    }

    pub fn add(&mut self, result: &PayoutResult) {
        self.wagers.push(result.wager_id.clone());
        self.volume += result.total_pool;

        for winner in &result.winners {
            let entry = self.entry(&winner.participant_id, &winner.display_name);
            entry.wagers += 1;
            if result.is_refund {
                entry.refunds += 1;
            } else {
                entry.wins += 1;
            }
            entry.staked += winner.stake + winner.forfeited;
            entry.paid_out += winner.payout;
        }
        for loser in &result.losers {
            let entry = self.entry(&loser.participant_id, &loser.display_name);
            entry.wagers += 1;
            entry.staked += loser.stake;
        }
    }

    pub fn net_for(&self, participant: &ParticipantId) -> Decimal {
        self.participants
            .get(participant)
            .map(ParticipantProfit::net)
            .unwrap_or(Decimal::ZERO)
    }

    /// Participants ordered by net profit, best first. Ties keep id order.
    pub fn leaderboard(&self) -> Vec<(&ParticipantId, &ParticipantProfit)> {
        let mut rows: Vec<_> = self.participants.iter().collect();
        rows.sort_by(|a, b| b.1.net().cmp(&a.1.net()));
        rows
    }

    fn entry(&mut self, participant: &ParticipantId, display_name: &str) -> &mut ParticipantProfit {
        let entry = self
            .participants
            .entry(participant.clone())
            .or_default();
        entry.display_name = display_name.to_string();
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wager::payout::{LoserLoss, SettlementRule, WinnerPayout};
    use rust_decimal_macros::dec;

    fn winner(id: &str, stake: Decimal, payout: Decimal) -> WinnerPayout {
        WinnerPayout {
            participant_id: ParticipantId::from(id),
            display_name: id.to_string(),
            stake,
            forfeited: Decimal::ZERO,
            payout,
        }
    }

    fn result(id: &str, winners: Vec<WinnerPayout>, losers: Vec<LoserLoss>, refund: bool) -> PayoutResult {
        let total_pool = winners.iter().map(|w| w.payout).sum();
        PayoutResult {
            wager_id: WagerId::from(id),
            rule: SettlementRule::SingleVote,
            total_pool,
            winning_pool: Decimal::ZERO,
            losing_pool: Decimal::ZERO,
            forfeited_pool: Decimal::ZERO,
            winning_options: vec![],
            winners,
            losers,
            is_refund: refund,
        }
    }

    #[test]
    fn test_profit_across_wagers() {
        let first = result(
            "w1",
            vec![winner("alice", dec!(10), dec!(30))],
            vec![LoserLoss {
                participant_id: ParticipantId::from("bob"),
                display_name: "bob".to_string(),
                stake: dec!(20),
            }],
            false,
        );
        let second = result(
            "w2",
            vec![winner("alice", dec!(5), dec!(5)), winner("bob", dec!(7), dec!(7))],
            vec![],
            true,
        );

        let report = ProfitReport::from_results([&first, &second]);
        assert_eq!(report.wagers.len(), 2);
        assert_eq!(report.volume, dec!(42));
        assert_eq!(report.net_for(&"alice".into()), dec!(20));
        assert_eq!(report.net_for(&"bob".into()), dec!(-20));
        assert_eq!(report.participants[&ParticipantId::from("bob")].refunds, 1);
        assert_eq!(report.leaderboard()[0].0.as_str(), "alice");
    }
}
