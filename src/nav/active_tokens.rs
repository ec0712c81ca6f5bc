//! Ordered unique set of tokens a pool tracks besides its base token.

use alloy_primitives::Address;
use std::collections::HashMap;
use tracing::info;

use crate::errors::PoolError;
use crate::oracle::Oracle;

/// Upper bound on tracked tokens per pool.
pub const MAX_ACTIVE_TOKENS: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveTokenSet {
    addresses: Vec<Address>,
    /// token -> index in `addresses`
    positions: HashMap<Address, usize>,
}

impl ActiveTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.positions.contains_key(token)
    }

    /// Add `token` unless it is the base token or already tracked.
    ///
    /// Requires a price feed, except for the native sentinel which the
    /// oracle prices implicitly. Returns whether the token was inserted.
    pub fn add_unique(
        &mut self,
        oracle: &dyn Oracle,
        token: Address,
        base_token: Address,
    ) -> Result<bool, PoolError> {
        if token == base_token || self.contains(&token) {
            return Ok(false);
        }
        if token != Address::ZERO && !oracle.has_price_feed(token) {
            return Err(PoolError::TokenPriceFeedDoesNotExist(token));
        }
        if self.addresses.len() >= MAX_ACTIVE_TOKENS {
            return Err(PoolError::ActiveTokenSetFull);
        }

        self.positions.insert(token, self.addresses.len());
        self.addresses.push(token);
        info!(token = ?token, "token activated");
        Ok(true)
    }

    /// Remove `token`, moving the last element into its slot.
    pub fn remove(&mut self, token: &Address) -> bool {
        let Some(index) = self.positions.remove(token) else {
            return false;
        };
        self.addresses.swap_remove(index);
        if let Some(moved) = self.addresses.get(index) {
            self.positions.insert(*moved, index);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PriceFeedOracle;
    use alloy_primitives::U256;

    fn priced(tokens: &[Address]) -> PriceFeedOracle {
        let oracle = PriceFeedOracle::new(Address::repeat_byte(0x77));
        for token in tokens {
            oracle.update_price(*token, U256::from(1_000u64), 18);
        }
        oracle
    }

    #[test]
    fn test_add_skips_base_and_duplicates() {
        let base = Address::repeat_byte(0x01);
        let token = Address::repeat_byte(0x02);
        let oracle = priced(&[base, token]);
        let mut set = ActiveTokenSet::new();

        assert!(!set.add_unique(&oracle, base, base).unwrap());
        assert!(set.add_unique(&oracle, token, base).unwrap());
        assert!(!set.add_unique(&oracle, token, base).unwrap());
        assert_eq!(set.addresses(), &[token]);
    }

    #[test]
    fn test_add_requires_price_feed() {
        let base = Address::repeat_byte(0x01);
        let unpriced = Address::repeat_byte(0x03);
        let oracle = priced(&[]);
        let mut set = ActiveTokenSet::new();

        assert_eq!(
            set.add_unique(&oracle, unpriced, base),
            Err(PoolError::TokenPriceFeedDoesNotExist(unpriced))
        );
        // native sentinel is always accepted
        assert!(set.add_unique(&oracle, Address::ZERO, base).unwrap());
    }

    #[test]
    fn test_capacity_bound() {
        let base = Address::repeat_byte(0xff);
        let tokens: Vec<Address> = (0..=MAX_ACTIVE_TOKENS)
            .map(|i| Address::with_last_byte(i as u8).create(0))
            .collect();
        let oracle = priced(&tokens);
        let mut set = ActiveTokenSet::new();

        for token in &tokens[..MAX_ACTIVE_TOKENS] {
            set.add_unique(&oracle, *token, base).unwrap();
        }
        assert_eq!(
            set.add_unique(&oracle, tokens[MAX_ACTIVE_TOKENS], base),
            Err(PoolError::ActiveTokenSetFull)
        );
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let base = Address::repeat_byte(0xff);
        let [a, b, c] = [0x0a, 0x0b, 0x0c].map(Address::repeat_byte);
        let oracle = priced(&[a, b, c]);
        let mut set = ActiveTokenSet::new();
        for token in [a, b, c] {
            set.add_unique(&oracle, token, base).unwrap();
        }

        assert!(set.remove(&a));
        assert_eq!(set.addresses(), &[c, b]);
        assert!(set.remove(&c));
        assert!(!set.remove(&c));
        assert_eq!(set.addresses(), &[b]);
        assert!(set.contains(&b));
    }
}
