//! Price oracle
//!
//! Every token is priced against the chain's native currency. A feed stores
//! the price of one whole token in native wei (18 decimals) together with
//! the token's decimals, so converting between two tokens goes through the
//! native numeraire:
//!
//! ```text
//! out = amount * price(token) * 10^dec(target) / (10^dec(token) * price(target))
//! ```
//!
//! Native currency (`Address::ZERO`) and wrapped native always have a feed
//! at 1:1.

use alloy_primitives::{Address, I256, U256};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::errors::Revert;

/// Revert reasons surfaced by [`PriceFeedOracle`].
pub const MISSING_PRICE_FEED: &str = "OracleMissingPriceFeed";
pub const CONVERSION_OVERFLOW: &str = "OracleConversionOverflow";

/// Token conversion service consulted by the NAV engine.
///
/// Calls into an oracle are external calls: they can revert, and the revert
/// data is propagated verbatim by callers.
pub trait Oracle: Send + Sync {
    fn has_price_feed(&self, token: Address) -> bool;

    /// Convert a signed amount of `token` into `target` units.
    fn convert_token_amount(
        &self,
        token: Address,
        amount: I256,
        target: Address,
    ) -> Result<I256, Revert>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFeed {
    /// Native wei per whole token
    pub price: U256,
    pub decimals: u8,
}

/// Oracle backed by a price-feed table.
pub struct PriceFeedOracle {
    wrapped_native: Address,
    feeds: RwLock<HashMap<Address, PriceFeed>>,
}

impl PriceFeedOracle {
    pub fn new(wrapped_native: Address) -> Self {
        Self {
            wrapped_native,
            feeds: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the feed of `token`.
    pub fn update_price(&self, token: Address, price: U256, decimals: u8) {
        debug!(token = ?token, price = %price, decimals, "price feed updated");
        self.feeds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, PriceFeed { price, decimals });
    }

    pub fn remove_price(&self, token: Address) {
        self.feeds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token);
    }

    fn feed(&self, token: Address) -> Option<PriceFeed> {
        if token == Address::ZERO || token == self.wrapped_native {
            return Some(PriceFeed {
                price: one_ether(),
                decimals: 18,
            });
        }
        self.feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token)
            .copied()
            .filter(|feed| !feed.price.is_zero())
    }
}

impl Oracle for PriceFeedOracle {
    fn has_price_feed(&self, token: Address) -> bool {
        self.feed(token).is_some()
    }

    fn convert_token_amount(
        &self,
        token: Address,
        amount: I256,
        target: Address,
    ) -> Result<I256, Revert> {
        let from = self
            .feed(token)
            .ok_or_else(|| Revert::from_reason(MISSING_PRICE_FEED))?;
        let to = self
            .feed(target)
            .ok_or_else(|| Revert::from_reason(MISSING_PRICE_FEED))?;

        let overflow = || Revert::from_reason(CONVERSION_OVERFLOW);
        let numerator = amount
            .unsigned_abs()
            .checked_mul(from.price)
            .and_then(|v| v.checked_mul(checked_pow10(to.decimals)?))
            .ok_or_else(overflow)?;
        let denominator = checked_pow10(from.decimals)
            .and_then(|v| v.checked_mul(to.price))
            .ok_or_else(overflow)?;
        let magnitude = I256::try_from(numerator / denominator).map_err(|_| overflow())?;

        Ok(if amount.is_negative() { -magnitude } else { magnitude })
    }
}

/// `10^decimals`, `None` past 77.
pub fn checked_pow10(decimals: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// `10^decimals` for pool decimals, which never exceed 18.
pub fn pow10(decimals: u8) -> U256 {
    checked_pow10(decimals).unwrap_or(U256::MAX)
}

fn one_ether() -> U256 {
    pow10(18)
}
