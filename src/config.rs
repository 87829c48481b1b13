//! Settlement configuration
//!
//! Presentation rounding, the stake floor, and result verification.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settlement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Decimal places for presented figures
    #[serde(default = "default_display_decimals")]
    pub display_decimals: u32,

    /// Lowest permitted stake, applied even when a wager's minimum is lower
    #[serde(default = "default_stake_floor")]
    pub stake_floor: Decimal,

    /// Check conservation on every freshly computed result
    #[serde(default = "default_true")]
    pub verify_conservation: bool,

    /// Allowed drift between payouts and pool (one minor currency unit)
    #[serde(default = "default_conservation_tolerance")]
    pub conservation_tolerance: Decimal,

    /// Keep settled results in the payout cache
    #[serde(default = "default_true")]
    pub cache_payouts: bool,
}

fn default_display_decimals() -> u32 {
    2
}

fn default_stake_floor() -> Decimal {
    Decimal::ONE
}

fn default_conservation_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_true() -> bool {
    true
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            display_decimals: default_display_decimals(),
            stake_floor: default_stake_floor(),
            verify_conservation: true,
            conservation_tolerance: default_conservation_tolerance(),
            cache_payouts: true,
        }
    }
}

impl SettlementConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment or default path
    pub fn from_env() -> Self {
        let path = std::env::var("SETTLEMENT_CONFIG_PATH")
            .unwrap_or_else(|_| "settlement.toml".to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default settlement config ({}): {}", path, e);
            Self::default()
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.stake_floor <= Decimal::ZERO {
            anyhow::bail!("stake_floor must be positive, got {}", self.stake_floor);
        }
        if self.conservation_tolerance.is_sign_negative() {
            anyhow::bail!(
                "conservation_tolerance must not be negative, got {}",
                self.conservation_tolerance
            );
        }
        if self.display_decimals > 8 {
            anyhow::bail!("display_decimals must be at most 8, got {}", self.display_decimals);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SettlementConfig::default();
        assert_eq!(config.display_decimals, 2);
        assert_eq!(config.stake_floor, dec!(1));
        assert_eq!(config.conservation_tolerance, dec!(0.01));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "display_decimals = 4").unwrap();
        writeln!(file, "cache_payouts = false").unwrap();

        let config = SettlementConfig::load(file.path()).unwrap();
        assert_eq!(config.display_decimals, 4);
        assert!(!config.cache_payouts);
        assert_eq!(config.stake_floor, dec!(1));
        assert!(config.verify_conservation);
    }

    #[test]
    fn test_rejects_zero_floor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stake_floor = \"0\"").unwrap();
        assert!(SettlementConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_from_env_reads_configured_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "display_decimals = 3").unwrap();

        std::env::set_var("SETTLEMENT_CONFIG_PATH", file.path());
        let configured = SettlementConfig::from_env();
        std::env::set_var("SETTLEMENT_CONFIG_PATH", file.path().with_extension("missing"));
        let fallback = SettlementConfig::from_env();
        std::env::remove_var("SETTLEMENT_CONFIG_PATH");

        assert_eq!(configured.display_decimals, 3);
        assert_eq!(fallback, SettlementConfig::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SettlementConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: SettlementConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }
}
