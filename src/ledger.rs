//! In-process token ledger
//!
//! ERC-20 style balances keyed by `(token, holder)`. `Address::ZERO` as the
//! token means native currency. Tokens can be marked broken so every
//! balance read reverts, which is how a non-compliant or paused token looks
//! from a pool's point of view.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

use crate::errors::{PoolError, Revert};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    /// token -> revert reason returned by `balanceOf`
    broken: HashMap<Address, String>,
    wrapped_native: Address,
}

impl Ledger {
    pub fn new(wrapped_native: Address) -> Self {
        Self {
            wrapped_native,
            ..Default::default()
        }
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// `balanceOf(holder)` as an external call: may revert.
    pub fn balance_of(&self, token: Address, holder: Address) -> Result<U256, Revert> {
        if let Some(reason) = self.broken.get(&token) {
            return Err(Revert::from_reason(reason.clone()));
        }
        Ok(self.raw_balance(token, holder))
    }

    /// Balance without going through the token contract. Used by the ledger
    /// itself and by tests.
    pub fn raw_balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        let slot = self.balances.entry((token, to)).or_default();
        *slot = slot.saturating_add(amount);
    }

    pub fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<(), PoolError> {
        let balance = self.raw_balance(token, from);
        let rest = balance
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance { token, holder: from })?;
        self.balances.insert((token, from), rest);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PoolError> {
        if let Some(reason) = self.broken.get(&token) {
            return Err(Revert::from_reason(reason.clone()).into());
        }
        self.burn(token, from, amount)?;
        self.mint(token, to, amount);
        Ok(())
    }

    /// Native -> wrapped native, 1:1.
    pub fn wrap_native(&mut self, holder: Address, amount: U256) -> Result<(), PoolError> {
        self.burn(Address::ZERO, holder, amount)?;
        self.mint(self.wrapped_native, holder, amount);
        Ok(())
    }

    /// Wrapped native -> native, 1:1.
    pub fn unwrap_native(&mut self, holder: Address, amount: U256) -> Result<(), PoolError> {
        self.burn(self.wrapped_native, holder, amount)?;
        self.mint(Address::ZERO, holder, amount);
        Ok(())
    }

    /// Make every balance read and transfer of `token` revert with `reason`.
    pub fn break_token(&mut self, token: Address, reason: impl Into<String>) {
        self.broken.insert(token, reason.into());
    }

    pub fn repair_token(&mut self, token: Address) {
        self.broken.remove(&token);
    }
}
