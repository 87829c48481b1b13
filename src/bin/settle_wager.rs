//! Settle Wager CLI
//!
//! Runs the settlement engine over a wager and its stake snapshot read from
//! JSON, and prints the payout breakdown.
//!
//! Usage:
//!   cargo run --bin settle_wager -- --input wager.json
//!   cargo run --bin settle_wager -- --input wager.json --decimals 4 --pretty
//!   cargo run --bin settle_wager -- --input a.json --input b.json --report
//!
//! Input format:
//!   { "wager": { ...Wager... }, "stakes": [ { ...StakeRecord... }, ... ] }

use anyhow::{Context, Result};
use clap::Parser;
use groupbet_settlement::wager::{settle, PayoutResult, ProfitReport, StakeRecord, Wager};
use groupbet_settlement::SettlementConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "settle_wager")]
#[command(about = "Compute payouts for a settled group wager")]
struct Args {
    /// JSON file holding `{ wager, stakes }` (repeatable)
    #[arg(long, required = true)]
    input: Vec<PathBuf>,

    /// Settlement config TOML (falls back to ./settlement.toml, then defaults)
    #[arg(long, env = "SETTLEMENT_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override presentation decimals
    #[arg(long)]
    decimals: Option<u32>,

    /// Print unrounded figures
    #[arg(long, default_value = "false")]
    raw: bool,

    /// Print a per-participant profit report across all inputs instead
    #[arg(long, default_value = "false")]
    report: bool,

    /// Pretty-print JSON output
    #[arg(long, default_value = "false")]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct SettlementInput {
    wager: Wager,
    #[serde(default)]
    stakes: Vec<StakeRecord>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("settle_wager=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SettlementConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SettlementConfig::from_env(),
    };
    if let Some(decimals) = args.decimals {
        config.display_decimals = decimals;
    }

    let mut results = Vec::with_capacity(args.input.len());
    for path in &args.input {
        results.push(settle_file(path, &config)?);
    }

    let output = if args.report {
        serde_json::to_value(ProfitReport::from_results(&results))?
    } else {
        let presented: Vec<PayoutResult> = results
            .iter()
            .map(|r| if args.raw { r.clone() } else { r.rounded(config.display_decimals) })
            .collect();
        match presented.as_slice() {
            [single] => serde_json::to_value(single)?,
            _ => serde_json::to_value(&presented)?,
        }
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}

fn settle_file(path: &Path, config: &SettlementConfig) -> Result<PayoutResult> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let input: SettlementInput = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let result = settle(&input.wager, &input.stakes)
        .with_context(|| format!("Failed to settle wager {}", input.wager.id))?;

    if config.verify_conservation {
        result
            .verify_conservation(config.conservation_tolerance)
            .with_context(|| format!("Refusing to report payouts for wager {}", result.wager_id))?;
    }

    info!(
        wager_id = %result.wager_id,
        rule = ?result.rule,
        pool = %result.total_pool,
        winners = result.winners.len(),
        losers = result.losers.len(),
        refund = result.is_refund,
        "Settled"
    );
    Ok(result)
}
