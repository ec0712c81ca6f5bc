//! Token definitions for pools and the cross-chain allow-list
//!
//! Covers:
//! - The native sentinel (`Address::ZERO`)
//! - Wrapped native and the major stablecoins used as base tokens
//! - GRG, the staking token backing the `GrgStaking` application
//!
//! The simulation binary and tests seed the ledger and oracle from here.

use alloy_primitives::{address, Address};
use std::str::FromStr;

/// Native currency sentinel. Balances under this key are native balances.
pub const NATIVE: Address = Address::ZERO;

pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedcdeCB5BE3830");
pub const WBTC: Address = address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");
pub const GRG: Address = address!("4FbB350052Bca5417566f188eB2EBCE5b19BC964");

/// Represents a token a pool may hold
#[derive(Debug, Clone)]
pub struct Token {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
    /// Bridgeable through the spoke pool
    pub is_crosschain: bool,
}

// ============================================
// TOKEN TABLE
// ============================================

pub fn all_tokens() -> Vec<Token> {
    vec![
        Token { symbol: "ETH", address: NATIVE, decimals: 18, is_crosschain: false },
        Token { symbol: "WETH", address: WETH, decimals: 18, is_crosschain: true },
        Token { symbol: "USDC", address: USDC, decimals: 6, is_crosschain: true },
        Token { symbol: "USDT", address: USDT, decimals: 6, is_crosschain: true },
        Token { symbol: "DAI", address: DAI, decimals: 18, is_crosschain: false },
        Token { symbol: "WBTC", address: WBTC, decimals: 8, is_crosschain: false },
        Token { symbol: "GRG", address: GRG, decimals: 18, is_crosschain: false },
    ]
}

// ============================================
// HELPER FUNCTIONS
// ============================================

/// Addresses the spoke pool accepts for bridging
pub fn crosschain_token_addresses() -> Vec<Address> {
    all_tokens()
        .into_iter()
        .filter(|t| t.is_crosschain)
        .map(|t| t.address)
        .collect()
}

/// Get token by address
pub fn get_token(address: &Address) -> Option<Token> {
    all_tokens().into_iter().find(|t| t.address == *address)
}

/// Get token by symbol (case-insensitive)
pub fn by_symbol(symbol: &str) -> Option<Token> {
    all_tokens()
        .into_iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// A known symbol or a hex address
pub fn resolve(value: &str) -> Option<Address> {
    let value = value.trim();
    match by_symbol(value) {
        Some(token) => Some(token.address),
        None => Address::from_str(value).ok(),
    }
}

/// Token symbol, or the shortened address for unknown tokens
pub fn label(address: &Address) -> String {
    match get_token(address) {
        Some(token) => token.symbol.to_string(),
        None => {
            let hex = format!("{:?}", address);
            format!("{}..{}", &hex[..6], &hex[hex.len() - 4..])
        }
    }
}
