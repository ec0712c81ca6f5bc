//! Deployment Configuration
//!
//! Per-chain parameters for a smart pool deployment: addresses of the
//! collaborating contracts, the pool implementation version, cross-chain
//! limits and the event journal. Loaded from the environment (`.env`
//! supported) or from a TOML file.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::chain::ChainConfig;
use crate::dispatch::version::is_version_higher_or_equal;
use crate::tokens;

/// Basis points in 100%.
const MAX_BPS: u64 = 10_000;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    /// Wrapped native token (WETH on mainnet)
    pub wrapped_native: String,

    // ========== Pool Settings ==========
    /// Version string of the pool implementation, checked by adapters
    pub pool_version: String,

    /// Governance account allowed to manage adapters
    pub governance: String,

    /// GRG token and its staking proxy
    pub grg_token: String,
    pub staking_proxy: String,

    // ========== Cross-chain Settings ==========
    /// Bridge spoke pool on this chain
    pub spoke_pool: String,

    /// Tokens allowed through the bridge and the escrows
    pub crosschain_tokens: Vec<String>,

    /// Largest NAV tolerance a Sync message may carry, in bps
    pub max_nav_tolerance_bps: u64,

    /// Seconds a deposit stays fillable when the owner sets no deadline
    pub fill_window_secs: u32,

    // ========== Event Journal ==========
    /// Append every pool event to a JSON-lines file
    pub event_log: bool,

    pub event_log_path: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Network
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            wrapped_native: env::var("WRAPPED_NATIVE").unwrap_or(defaults.wrapped_native),

            // Pool
            pool_version: env::var("POOL_VERSION").unwrap_or(defaults.pool_version),
            governance: env::var("GOVERNANCE").unwrap_or(defaults.governance),
            grg_token: env::var("GRG_TOKEN").unwrap_or(defaults.grg_token),
            staking_proxy: env::var("STAKING_PROXY").unwrap_or(defaults.staking_proxy),

            // Cross-chain
            spoke_pool: env::var("SPOKE_POOL").unwrap_or(defaults.spoke_pool),
            crosschain_tokens: env::var("CROSSCHAIN_TOKENS")
                .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or(defaults.crosschain_tokens),
            max_nav_tolerance_bps: env::var("MAX_NAV_TOLERANCE_BPS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1_000),
            fill_window_secs: env::var("FILL_WINDOW_SECS")
                .unwrap_or_else(|_| "21600".to_string())
                .parse()
                .unwrap_or(21_600),

            // Journal
            event_log: env::var("EVENT_LOG")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            event_log_path: env::var("EVENT_LOG_PATH").unwrap_or(defaults.event_log_path),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn parse_address(field: &str, value: &str) -> Result<Address> {
        Address::from_str(value.trim()).wrap_err_with(|| format!("invalid {}: {:?}", field, value))
    }

    /// Bridge allow-list; entries are token symbols or addresses.
    pub fn crosschain_token_addresses(&self) -> Result<HashSet<Address>> {
        self.crosschain_tokens
            .iter()
            .map(|t| {
                tokens::resolve(t).ok_or_else(|| eyre!("invalid CROSSCHAIN_TOKENS entry: {:?}", t))
            })
            .collect()
    }

    /// Validate configuration before deploying a chain
    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(eyre!("CHAIN_ID must be non-zero"));
        }
        if !is_version_higher_or_equal(&self.pool_version, "0.0.0") {
            return Err(eyre!(
                "POOL_VERSION must look like major.minor.patch (got {:?})",
                self.pool_version
            ));
        }
        if self.max_nav_tolerance_bps > MAX_BPS {
            return Err(eyre!(
                "MAX_NAV_TOLERANCE_BPS cannot exceed {} (currently {})",
                MAX_BPS,
                self.max_nav_tolerance_bps
            ));
        }
        if self.fill_window_secs == 0 {
            return Err(eyre!("FILL_WINDOW_SECS must be non-zero"));
        }

        let wrapped_native = Self::parse_address("WRAPPED_NATIVE", &self.wrapped_native)?;
        if wrapped_native == Address::ZERO {
            return Err(eyre!("WRAPPED_NATIVE cannot be the zero address"));
        }
        Self::parse_address("GOVERNANCE", &self.governance)?;
        Self::parse_address("GRG_TOKEN", &self.grg_token)?;
        Self::parse_address("STAKING_PROXY", &self.staking_proxy)?;
        let spoke_pool = Self::parse_address("SPOKE_POOL", &self.spoke_pool)?;
        if spoke_pool == Address::ZERO {
            return Err(eyre!("SPOKE_POOL cannot be the zero address"));
        }

        let crosschain = self.crosschain_token_addresses()?;
        if crosschain.contains(&Address::ZERO) {
            return Err(eyre!("CROSSCHAIN_TOKENS cannot contain the native token"));
        }
        Ok(())
    }

    /// Typed chain parameters for [`crate::chain::Chain::new`].
    pub fn chain_config(&self) -> Result<ChainConfig> {
        self.validate()?;
        Ok(ChainConfig {
            chain_id: self.chain_id,
            wrapped_native: Self::parse_address("WRAPPED_NATIVE", &self.wrapped_native)?,
            pool_version: self.pool_version.clone(),
            spoke_pool: Self::parse_address("SPOKE_POOL", &self.spoke_pool)?,
            crosschain_tokens: self.crosschain_token_addresses()?,
            max_nav_tolerance_bps: self.max_nav_tolerance_bps,
            fill_window_secs: self.fill_window_secs,
            governance: Self::parse_address("GOVERNANCE", &self.governance)?,
            grg_token: Self::parse_address("GRG_TOKEN", &self.grg_token)?,
            staking_proxy: Self::parse_address("STAKING_PROXY", &self.staking_proxy)?,
        })
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              SMART POOL - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Pool Version:      {:^40} ║", self.pool_version);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CROSS-CHAIN                                                ║");
        println!("║ • Bridge Tokens:   {:^40} ║", self.crosschain_tokens.len());
        println!("║ • Max Tolerance:   {:>36} bps ║", self.max_nav_tolerance_bps);
        println!("║ • Fill Window:     {:>38} s ║", self.fill_window_secs);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ EVENT JOURNAL                                              ║");
        println!("║ • Journal:         {:^40} ║",
            if self.event_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: 1,
            wrapped_native: tokens::WETH.to_checksum(None),
            pool_version: "4.1.0".to_string(),
            governance: "0x0000000000000000000000000000000000006070".to_string(),
            grg_token: tokens::GRG.to_checksum(None),
            staking_proxy: "0x730dDf7b602dB822043e0409d8926440395e07fE".to_string(),
            spoke_pool: "0x5c7BCd6E7De5423a257D81B442095A1a6ced35C5".to_string(),
            crosschain_tokens: tokens::crosschain_token_addresses()
                .iter()
                .map(|a| a.to_checksum(None))
                .collect(),
            max_nav_tolerance_bps: 1_000,
            fill_window_secs: 21_600,
            event_log: false,
            event_log_path: "./logs/pool_events.jsonl".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();

        let chain = config.chain_config().unwrap();
        assert_eq!(chain.wrapped_native, tokens::WETH);
        assert!(chain.crosschain_tokens.contains(&tokens::USDC));
        assert_eq!(chain.crosschain_tokens.len(), 3);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.max_nav_tolerance_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pool_version = "four".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crosschain_tokens.push("0xnot-an-address".to_string());
        assert!(config.chain_config().is_err());

        let mut config = Config::default();
        config.crosschain_tokens.push(Address::ZERO.to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_crosschain_tokens_by_symbol() {
        let mut config = Config::default();
        config.crosschain_tokens = vec!["usdc".to_string(), tokens::WETH.to_string()];
        let allowed = config.crosschain_token_addresses().unwrap();
        assert!(allowed.contains(&tokens::USDC));
        assert!(allowed.contains(&tokens::WETH));
        assert_eq!(allowed.len(), 2);

        // the native symbol resolves to the zero address
        config.crosschain_tokens.push("ETH".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let path = env::temp_dir().join(format!("smartpool-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.chain_id = 10;
        config.event_log = true;

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }
}
