//! Settlement Engine
//!
//! Pure computation from a wager's configuration and its stake snapshot to a
//! [`PayoutResult`]. Every consumer (outcome declaration, payout reads,
//! reporting) goes through [`settle`]; the formula is not repeated elsewhere.
//!
//! # Rules
//!
//! All three variants reduce each participant to a position of
//! `(winning stake, other stake)` and then share one distribution step:
//!
//! - **Single vote**: the whole record is winning stake iff its option is the
//!   declared winner.
//! - **Exact match**: the participant's aggregated stake is winning stake iff
//!   their option set equals the winning set.
//! - **Partial match**: stake on winning options is winning stake; the rest is
//!   forfeited into the losing pool even when the participant wins.
//!
//! Distribution: with `W` = winners' winning stake and `L` = pure losers'
//! stake plus forfeits, each winner receives `stake + stake * L / W`. No winners
//! means a refund of every participant's full stake.
//!
//! # Determinism
//!
//! Stakes are grouped in a `BTreeMap` keyed by participant, so output order
//! does not depend on input order and repeated calls are identical.

use crate::wager::error::ConfigurationError;
use crate::wager::payout::{LoserLoss, PayoutResult, SettlementRule, WinnerPayout, WinningOption};
use crate::wager::types::{
    OptionId, Outcome, ParticipantId, SettlementMode, StakeRecord, VotingMode, Wager,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// POSITIONS
// =============================================================================

/// One participant's aggregated stake on a wager.
#[derive(Debug, Clone)]
struct Position {
    display_name: String,
    name_seen_at: DateTime<Utc>,
    options: BTreeSet<OptionId>,
    by_option: Vec<(OptionId, Decimal)>,
    total: Decimal,
}

/// A position judged against the outcome.
#[derive(Debug, Clone)]
struct Judged {
    participant_id: ParticipantId,
    display_name: String,
    winning: Decimal,
    other: Decimal,
}

impl Judged {
    fn total(&self) -> Decimal {
        self.winning + self.other
    }
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Compute the payout for `wager` from its complete stake snapshot.
///
/// Fails with a [`ConfigurationError`] when no outcome is declared, the
/// outcome does not match the wager's options or voting mode, or the stakes
/// do not belong to the wager as configured. Never returns a partial result.
pub fn settle(wager: &Wager, stakes: &[StakeRecord]) -> Result<PayoutResult, ConfigurationError> {
    let winning_set = resolve_outcome(wager)?;
    let positions = group_positions(wager, stakes)?;

    let rule = match wager.voting_mode {
        VotingMode::Single => SettlementRule::SingleVote,
        VotingMode::Multi { settlement: SettlementMode::ExactMatch } => SettlementRule::ExactMatch,
        VotingMode::Multi { settlement: SettlementMode::PartialMatch } => {
            SettlementRule::PartialMatch
        }
    };

    let judged: Vec<Judged> = positions
        .into_iter()
        .map(|(participant_id, position)| judge(rule, &winning_set, participant_id, position))
        .collect();

    let winning_options = wager
        .options
        .iter()
        .filter(|o| winning_set.contains(&o.id))
        .map(|o| WinningOption {
            id: o.id.clone(),
            text: o.text.clone(),
        })
        .collect();

    distribute(wager, rule, winning_options, judged)
}

/// Validate the declared outcome and return the winning option ids.
pub fn resolve_outcome(wager: &Wager) -> Result<BTreeSet<OptionId>, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidWinningOption {
        wager_id: wager.id.clone(),
        reason,
    };

    let outcome = wager
        .outcome
        .as_ref()
        .ok_or_else(|| ConfigurationError::NoWinningOption {
            wager_id: wager.id.clone(),
        })?;

    let winning: BTreeSet<OptionId> = match (wager.voting_mode, outcome) {
        (VotingMode::Single, Outcome::Single(id)) => std::iter::once(id.clone()).collect(),
        (VotingMode::Multi { .. }, Outcome::Multi(ids)) => ids.clone(),
        (VotingMode::Single, Outcome::Multi(_)) => {
            return Err(invalid("single-vote wager declared with a set of winners".to_string()))
        }
        (VotingMode::Multi { .. }, Outcome::Single(_)) => {
            return Err(invalid("multi-vote wager declared with a single winner".to_string()))
        }
    };

    if winning.is_empty() {
        return Err(ConfigurationError::NoWinningOption {
            wager_id: wager.id.clone(),
        });
    }
    if let Some(unknown) = winning.iter().find(|id| !wager.has_option(id)) {
        return Err(invalid(format!("option {} does not exist", unknown)));
    }
    Ok(winning)
}

// =============================================================================
// GROUPING
// =============================================================================

fn group_positions(
    wager: &Wager,
    stakes: &[StakeRecord],
) -> Result<BTreeMap<ParticipantId, Position>, ConfigurationError> {
    let inconsistent = |reason: String| ConfigurationError::InconsistentStakes {
        wager_id: wager.id.clone(),
        reason,
    };

    let mut positions: BTreeMap<ParticipantId, Position> = BTreeMap::new();

    for record in stakes {
        if record.wager_id != wager.id {
            return Err(inconsistent(format!(
                "record for {} belongs to wager {}",
                record.participant_id, record.wager_id
            )));
        }
        if !wager.has_option(&record.option_id) {
            return Err(inconsistent(format!(
                "{} staked on unknown option {}",
                record.participant_id, record.option_id
            )));
        }
        if record.amount <= Decimal::ZERO {
            return Err(inconsistent(format!(
                "{} has non-positive stake {}",
                record.participant_id, record.amount
            )));
        }

        let position = positions
            .entry(record.participant_id.clone())
            .or_insert_with(|| Position {
                display_name: record.display_name.clone(),
                name_seen_at: record.placed_at,
                options: BTreeSet::new(),
                by_option: Vec::new(),
                total: Decimal::ZERO,
            });

        if !wager.voting_mode.is_multi() && !position.options.is_empty() {
            return Err(inconsistent(format!(
                "{} holds more than one record on a single-vote wager",
                record.participant_id
            )));
        }
        if !position.options.insert(record.option_id.clone()) {
            return Err(inconsistent(format!(
                "{} holds two records for option {}",
                record.participant_id, record.option_id
            )));
        }

        // Latest snapshot wins; ties go to the greater name so input order never matters.
        if (record.placed_at, &record.display_name) > (position.name_seen_at, &position.display_name)
        {
            position.display_name = record.display_name.clone();
            position.name_seen_at = record.placed_at;
        }
        position.by_option.push((record.option_id.clone(), record.amount));
        position.total = position
            .total
            .checked_add(record.amount)
            .ok_or_else(|| ConfigurationError::AmountOverflow {
                wager_id: wager.id.clone(),
            })?;
    }

    Ok(positions)
}

fn judge(
    rule: SettlementRule,
    winning_set: &BTreeSet<OptionId>,
    participant_id: ParticipantId,
    position: Position,
) -> Judged {
    let winning = match rule {
        SettlementRule::SingleVote | SettlementRule::ExactMatch => {
            if &position.options == winning_set {
                position.total
            } else {
                Decimal::ZERO
            }
        }
        // Component amounts already summed without overflow into `total`.
        SettlementRule::PartialMatch => position
            .by_option
            .iter()
            .filter(|(id, _)| winning_set.contains(id))
            .map(|(_, amount)| *amount)
            .sum(),
    };

    Judged {
        participant_id,
        display_name: position.display_name,
        winning,
        other: position.total - winning,
    }
}

// =============================================================================
// DISTRIBUTION
// =============================================================================

fn distribute(
    wager: &Wager,
    rule: SettlementRule,
    winning_options: Vec<WinningOption>,
    judged: Vec<Judged>,
) -> Result<PayoutResult, ConfigurationError> {
    let overflow = || ConfigurationError::AmountOverflow {
        wager_id: wager.id.clone(),
    };

    let total_pool = checked_sum(judged.iter().map(Judged::total)).ok_or_else(overflow)?;
    let has_winner = judged.iter().any(|j| j.winning > Decimal::ZERO);

    if !has_winner {
        let winners = judged
            .into_iter()
            .map(|j| {
                let stake = j.total();
                WinnerPayout {
                    participant_id: j.participant_id,
                    display_name: j.display_name,
                    stake,
                    forfeited: Decimal::ZERO,
                    payout: stake,
                }
            })
            .collect();

        return Ok(PayoutResult {
            wager_id: wager.id.clone(),
            rule,
            total_pool,
            winning_pool: Decimal::ZERO,
            losing_pool: Decimal::ZERO,
            forfeited_pool: Decimal::ZERO,
            winning_options,
            winners,
            losers: Vec::new(),
            is_refund: true,
        });
    }

    let (winning, losing): (Vec<Judged>, Vec<Judged>) =
        judged.into_iter().partition(|j| j.winning > Decimal::ZERO);

    let winning_pool = checked_sum(winning.iter().map(|j| j.winning)).ok_or_else(overflow)?;
    let forfeited_pool = checked_sum(winning.iter().map(|j| j.other)).ok_or_else(overflow)?;
    let pure_losing = checked_sum(losing.iter().map(|j| j.other)).ok_or_else(overflow)?;
    let losing_pool = pure_losing.checked_add(forfeited_pool).ok_or_else(overflow)?;

    let mut winners = Vec::with_capacity(winning.len());
    for j in winning {
        // Multiply before dividing so a sole winner takes the pool exactly.
        let share = j
            .winning
            .checked_mul(losing_pool)
            .and_then(|v| v.checked_div(winning_pool))
            .ok_or_else(overflow)?;
        winners.push(WinnerPayout {
            participant_id: j.participant_id,
            display_name: j.display_name,
            stake: j.winning,
            forfeited: j.other,
            payout: j.winning.checked_add(share).ok_or_else(overflow)?,
        });
    }

    let losers = losing
        .into_iter()
        .map(|j| LoserLoss {
            participant_id: j.participant_id,
            display_name: j.display_name,
            stake: j.other,
        })
        .collect();

    Ok(PayoutResult {
        wager_id: wager.id.clone(),
        rule,
        total_pool,
        winning_pool,
        losing_pool,
        forfeited_pool,
        winning_options,
        winners,
        losers,
        is_refund: false,
    })
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}
