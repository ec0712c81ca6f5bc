//! Persisted per-pool layout

use alloy_primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::errors::PoolError;
use crate::nav::active_tokens::ActiveTokenSet;
use crate::nav::applications::Application;

/// Immutable identity fixed at initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub name: String,
    pub symbol: String,
    pub owner: Address,
    pub base_token: Address,
    pub decimals: u8,
}

impl PoolParams {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.decimals > 18 {
            return Err(PoolError::InvalidDecimals(self.decimals));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTokens {
    /// Base-token units per `10^decimals` pool shares. Zero until seeded.
    pub unitary_value: U256,
    pub total_supply: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStorage {
    pub params: PoolParams,
    pub tokens: PoolTokens,
    pub active_tokens: ActiveTokenSet,
    /// Bitmask over [`Application`] discriminants
    pub active_applications: u32,
    pub application_positions: BTreeMap<Application, Vec<U256>>,
    pub virtual_balances: BTreeMap<Address, I256>,
    pub accounts: HashMap<Address, U256>,
}

impl PoolStorage {
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            tokens: PoolTokens::default(),
            active_tokens: ActiveTokenSet::new(),
            active_applications: 0,
            application_positions: BTreeMap::new(),
            virtual_balances: BTreeMap::new(),
            accounts: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.params.owner
    }

    pub fn base_token(&self) -> Address {
        self.params.base_token
    }

    pub fn decimals(&self) -> u8 {
        self.params.decimals
    }

    pub fn balance_of(&self, holder: &Address) -> U256 {
        self.accounts.get(holder).copied().unwrap_or_default()
    }

    pub fn virtual_balance(&self, token: &Address) -> I256 {
        self.virtual_balances.get(token).copied().unwrap_or_default()
    }

    /// Add `delta` to the virtual balance of `token`, dropping the entry when
    /// it returns to zero.
    pub fn adjust_virtual_balance(&mut self, token: Address, delta: I256) -> Result<I256, PoolError> {
        let current = self.virtual_balance(&token);
        let (next, overflow) = current.overflowing_add(delta);
        if overflow {
            return Err(PoolError::Overflow);
        }
        if next.is_zero() {
            self.virtual_balances.remove(&token);
        } else {
            self.virtual_balances.insert(token, next);
        }
        Ok(next)
    }

    pub fn is_application_active(&self, app: Application) -> bool {
        self.active_applications & app.flag() != 0
    }

    pub fn set_application_active(&mut self, app: Application, active: bool) {
        if active {
            self.active_applications |= app.flag();
        } else {
            self.active_applications &= !app.flag();
        }
    }

    pub fn mint_shares(&mut self, to: Address, amount: U256) -> Result<(), PoolError> {
        self.tokens.total_supply = self
            .tokens
            .total_supply
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;
        let balance = self.accounts.entry(to).or_default();
        *balance += amount;
        Ok(())
    }

    pub fn burn_shares(&mut self, from: Address, amount: U256) -> Result<(), PoolError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(PoolError::InsufficientBalance {
                token: Address::ZERO,
                holder: from,
            });
        }
        self.accounts.insert(from, balance - amount);
        self.tokens.total_supply -= amount;
        Ok(())
    }
}
