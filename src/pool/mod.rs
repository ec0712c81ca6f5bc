//! Smart pool proxy
//!
//! Native methods (mint, burn, NAV refresh, purge, active tokens) run here;
//! every other selector goes to the fallback dispatcher.
//!
//! SHARE MATH:
//! - minted  = amount_in * 10^decimals / unitary_value
//! - revenue = amount_in * unitary_value / 10^decimals

pub mod storage;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use tracing::info;

use crate::abi::ISmartPool::{self, ISmartPoolCalls};
use crate::chain::Tx;
use crate::dispatch::fallback;
use crate::errors::PoolError;
use crate::events::PoolEvent;
use crate::nav::applications::Application;
use crate::oracle::pow10;

/// Smallest accepted mint, as a fraction of one base-token unit.
const MINIMUM_ORDER_DIVISOR: u64 = 1_000;

pub struct SmartPool<'t, 'a> {
    tx: &'t mut Tx<'a>,
    address: Address,
}

impl<'t, 'a> SmartPool<'t, 'a> {
    pub fn new(tx: &'t mut Tx<'a>, address: Address) -> Self {
        Self { tx, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Decode and run `calldata` sent by `caller`.
    pub fn handle(self, caller: Address, calldata: &[u8]) -> Result<Bytes, PoolError> {
        if calldata.len() < 4 || !ISmartPoolCalls::valid_selector(fallback::selector_of(calldata).0) {
            return fallback::fallback(self.tx, self.address, caller, calldata);
        }

        let call = ISmartPoolCalls::abi_decode(calldata)
            .map_err(|e| PoolError::MessageDecoding(e.to_string()))?;
        let out = match call {
            ISmartPoolCalls::mint(c) => self
                .mint(caller, c.recipient, c.amountIn, c.amountOutMin)?
                .abi_encode(),
            ISmartPoolCalls::burn(c) => self.burn(caller, c.amountIn, c.amountOutMin)?.abi_encode(),
            ISmartPoolCalls::updateUnitaryValue(_) => self.update_unitary_value()?.abi_encode(),
            ISmartPoolCalls::purgeInactiveTokensAndApps(_) => {
                self.purge_inactive_tokens_and_apps(caller)?;
                Vec::new()
            }
            ISmartPoolCalls::getActiveTokens(_) => self.active_tokens()?.abi_encode(),
        };
        Ok(out.into())
    }

    /// Buy shares with base token.
    pub fn mint(
        mut self,
        caller: Address,
        recipient: Address,
        amount_in: U256,
        amount_out_min: U256,
    ) -> Result<U256, PoolError> {
        let pool = self.address;
        let storage = self.tx.pool(pool)?;
        let (base, decimals) = (storage.base_token(), storage.decimals());

        let minimum = pow10(decimals) / U256::from(MINIMUM_ORDER_DIVISOR);
        if amount_in.is_zero() {
            return Err(PoolError::InvalidAmount);
        }
        if amount_in < minimum {
            return Err(PoolError::AmountTooSmall(amount_in));
        }

        let nav = self.tx.update_nav(pool)?;
        self.tx.state.ledger.transfer(base, caller, pool, amount_in)?;

        let minted = amount_in
            .checked_mul(pow10(decimals))
            .ok_or(PoolError::Overflow)?
            / nav.unitary_value;
        if minted.is_zero() {
            return Err(PoolError::AmountTooSmall(amount_in));
        }
        if minted < amount_out_min {
            return Err(PoolError::AmountOutBelowMinimum {
                expected: amount_out_min,
                actual: minted,
            });
        }

        self.tx.pool_mut(pool)?.mint_shares(recipient, minted)?;
        info!(pool = ?pool, recipient = ?recipient, amount_in = %amount_in, minted = %minted, "mint");
        self.tx.emit(PoolEvent::Mint {
            pool,
            caller,
            recipient,
            amount_in,
            minted,
        });
        Ok(minted)
    }

    /// Sell shares for base token.
    pub fn burn(mut self, caller: Address, amount_in: U256, amount_out_min: U256) -> Result<U256, PoolError> {
        let pool = self.address;
        if amount_in.is_zero() {
            return Err(PoolError::InvalidAmount);
        }
        let storage = self.tx.pool(pool)?;
        if storage.balance_of(&caller) < amount_in {
            return Err(PoolError::InsufficientBalance {
                token: pool,
                holder: caller,
            });
        }
        let (base, decimals) = (storage.base_token(), storage.decimals());

        let nav = self.tx.update_nav(pool)?;
        let revenue = amount_in
            .checked_mul(nav.unitary_value)
            .ok_or(PoolError::Overflow)?
            / pow10(decimals);
        if revenue.is_zero() {
            return Err(PoolError::AmountTooSmall(amount_in));
        }
        if revenue < amount_out_min {
            return Err(PoolError::AmountOutBelowMinimum {
                expected: amount_out_min,
                actual: revenue,
            });
        }

        let available = self
            .tx
            .state
            .ledger
            .balance_of(base, pool)
            .map_err(|_| PoolError::BaseTokenBalance)?;
        if available < revenue {
            return Err(PoolError::NotEnoughBaseToken {
                available,
                required: revenue,
            });
        }

        self.tx.pool_mut(pool)?.burn_shares(caller, amount_in)?;
        self.tx.state.ledger.transfer(base, pool, caller, revenue)?;
        info!(pool = ?pool, holder = ?caller, burned = %amount_in, revenue = %revenue, "burn");
        self.tx.emit(PoolEvent::Burn {
            pool,
            holder: caller,
            burned: amount_in,
            revenue,
        });
        Ok(revenue)
    }

    /// Permissionless NAV refresh.
    pub fn update_unitary_value(mut self) -> Result<crate::abi::NavComponents, PoolError> {
        let update = self.tx.update_nav(self.address)?;
        let storage = self.tx.pool(self.address)?;
        Ok(update.components(storage))
    }

    pub fn active_tokens(&self) -> Result<Vec<Address>, PoolError> {
        Ok(self.tx.pool(self.address)?.active_tokens.addresses().to_vec())
    }

    /// Drop tokens and applications that no longer hold value. Owner only.
    ///
    /// A token goes when its balance is zero or unreadable and neither an
    /// application nor a virtual balance references it. An application bit
    /// is cleared when the application reports nothing.
    pub fn purge_inactive_tokens_and_apps(mut self, caller: Address) -> Result<(), PoolError> {
        let pool = self.address;
        let env = self.tx.env;
        let state = &mut *self.tx.state;
        let storage = state.pools.get(&pool).ok_or(PoolError::PoolNotFound(pool))?;
        if caller != storage.owner() {
            return Err(PoolError::CallerIsNotOwner);
        }

        let reports = env
            .aggregator
            .get_app_token_balances(&state.applications, pool, storage, storage.active_applications)?;

        let mut exposed = Vec::new();
        let mut idle_apps: Vec<Application> = Vec::new();
        for report in &reports {
            let live: Vec<Address> = report
                .balances
                .iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(token, _)| *token)
                .collect();
            if live.is_empty() {
                idle_apps.push(report.app);
            }
            exposed.extend(live);
        }

        let mut removable = Vec::new();
        for token in storage.active_tokens.addresses() {
            if exposed.contains(token) || !storage.virtual_balance(token).is_zero() {
                continue;
            }
            let empty = match state.ledger.balance_of(*token, pool) {
                Ok(balance) => balance.is_zero(),
                Err(_) => true,
            };
            if empty {
                removable.push(*token);
            }
        }

        let storage = state
            .pools
            .get_mut(&pool)
            .ok_or(PoolError::PoolNotFound(pool))?;
        for app in idle_apps {
            storage.set_application_active(app, false);
            info!(pool = ?pool, app = %app, "application deactivated");
        }
        for token in &removable {
            storage.active_tokens.remove(token);
        }
        for token in removable {
            info!(pool = ?pool, token = ?token, "token removed");
            self.tx.emit(PoolEvent::TokenRemoved { pool, token });
        }
        Ok(())
    }
}

/// Calldata for `mint`.
pub fn mint_calldata(recipient: Address, amount_in: U256, amount_out_min: U256) -> Vec<u8> {
    ISmartPool::mintCall {
        recipient,
        amountIn: amount_in,
        amountOutMin: amount_out_min,
    }
    .abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::NavComponents;
    use crate::testutil::*;
    use alloy_primitives::I256;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_first_mint_usdc() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, OWNER, 1_000_000);

        let minted = chain
            .mint(OWNER, pool, OWNER, U256::from(1_000_000u64), U256::ZERO)
            .unwrap();

        let storage = chain.pool(pool).unwrap();
        assert_eq!(minted, U256::from(1_000_000u64));
        assert_eq!(storage.tokens.unitary_value, U256::from(1_000_000u64));
        assert_eq!(storage.tokens.total_supply, U256::from(1_000_000u64));
        assert_eq!(chain.balance(USDC, pool), U256::from(1_000_000u64));
    }

    #[test]
    fn test_mint_through_calldata() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, ALICE, 5_000_000);

        let out = chain
            .call(ALICE, pool, &mint_calldata(ALICE, U256::from(5_000_000u64), U256::ZERO))
            .unwrap();
        let minted = <U256 as SolValue>::abi_decode(&out).unwrap();
        assert_eq!(minted, U256::from(5_000_000u64));
    }

    #[test]
    fn test_mint_rejects_dust_and_slippage() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, ALICE, 10_000_000);

        assert_eq!(
            chain.mint(ALICE, pool, ALICE, U256::ZERO, U256::ZERO),
            Err(PoolError::InvalidAmount)
        );
        assert_eq!(
            chain.mint(ALICE, pool, ALICE, U256::from(999), U256::ZERO),
            Err(PoolError::AmountTooSmall(U256::from(999)))
        );
        let err = chain
            .mint(ALICE, pool, ALICE, U256::from(1_000_000u64), U256::from(2_000_000u64))
            .unwrap_err();
        assert!(matches!(err, PoolError::AmountOutBelowMinimum { .. }));
        // nothing stuck from the failed attempts
        assert_eq!(chain.balance(USDC, ALICE), U256::from(10_000_000u64));
    }

    #[test]
    fn test_burn_after_value_growth() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, ALICE, 1_000_000);
        chain
            .mint(ALICE, pool, ALICE, U256::from(1_000_000u64), U256::ZERO)
            .unwrap();

        // pool doubles in value
        fund(&mut chain, USDC, pool, 1_000_000);
        let revenue = chain
            .burn(ALICE, pool, U256::from(500_000u64), U256::ZERO)
            .unwrap();
        assert_eq!(revenue, U256::from(1_000_000u64));
        assert_eq!(chain.pool(pool).unwrap().tokens.unitary_value, U256::from(2_000_000u64));
        assert_eq!(chain.balance(USDC, ALICE), U256::from(1_000_000u64));
    }

    #[test]
    fn test_burn_without_enough_base_token() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, ALICE, 1_000_000);
        chain
            .mint(ALICE, pool, ALICE, U256::from(1_000_000u64), U256::ZERO)
            .unwrap();
        // half of the value is held off the pool's balance
        chain.state_mut().pools.get_mut(&pool).unwrap()
            .adjust_virtual_balance(USDC, I256::try_from(1_000_000i64).unwrap())
            .unwrap();

        let err = chain.burn(ALICE, pool, U256::from(1_000_000u64), U256::ZERO).unwrap_err();
        assert_eq!(
            err,
            PoolError::NotEnoughBaseToken {
                available: U256::from(1_000_000u64),
                required: U256::from(2_000_000u64),
            }
        );
        assert_eq!(chain.balance(USDC, pool), U256::from(1_000_000u64));
    }

    #[test]
    fn test_insolvent_pool_burns_at_floor_value() {
        let (mut chain, pool) = usdc_pool_chain();
        fund(&mut chain, USDC, ALICE, 1_000_000);
        chain
            .mint(ALICE, pool, ALICE, U256::from(1_000_000u64), U256::ZERO)
            .unwrap();
        // 1.5 USDC owed against 1 USDC held
        chain.state_mut().pools.get_mut(&pool).unwrap()
            .adjust_virtual_balance(USDC, I256::try_from(-1_500_000i64).unwrap())
            .unwrap();

        let nav = chain.update_unitary_value(ALICE, pool).unwrap();
        assert_eq!(nav.unitary_value, U256::from(1));

        let revenue = chain.burn(ALICE, pool, U256::from(1_000_000u64), U256::ZERO).unwrap();
        assert_eq!(revenue, U256::from(1));
        assert_eq!(chain.balance(USDC, pool), U256::from(999_999u64));
    }

    #[test]
    fn test_burn_more_than_held() {
        let (mut chain, pool) = usdc_pool_chain();
        let err = chain.burn(ALICE, pool, U256::from(1), U256::ZERO).unwrap_err();
        assert_eq!(err, PoolError::InsufficientBalance { token: pool, holder: ALICE });
    }

    #[test]
    fn test_update_unitary_value_calldata_returns_components() {
        let (mut chain, pool) = usdc_pool_chain();
        let calldata = ISmartPool::updateUnitaryValueCall {}.abi_encode();
        let out = chain.call(ALICE, pool, &calldata).unwrap();
        let components = <NavComponents as SolValue>::abi_decode(&out).unwrap();
        assert_eq!(components.unitaryValue, U256::from(1_000_000u64));
        assert_eq!(components.baseToken, USDC);
        assert_eq!(components.decimals, 6);
    }

    #[test]
    fn test_purge_drops_idle_tokens_only() {
        let (mut chain, pool) = usdc_pool_chain();
        chain
            .transact(OWNER, |tx| {
                tx.activate_token(pool, WETH)?;
                tx.activate_token(pool, DAI)?;
                tx.activate_token(pool, WBTC)
            })
            .unwrap();
        fund(&mut chain, DAI, pool, 10);
        chain.state_mut().pools.get_mut(&pool).unwrap()
            .adjust_virtual_balance(WBTC, I256::try_from(-3i64).unwrap())
            .unwrap();

        assert_eq!(
            chain.call(ALICE, pool, &ISmartPool::purgeInactiveTokensAndAppsCall {}.abi_encode()),
            Err(PoolError::CallerIsNotOwner)
        );
        chain
            .call(OWNER, pool, &ISmartPool::purgeInactiveTokensAndAppsCall {}.abi_encode())
            .unwrap();

        let active = chain.pool(pool).unwrap().active_tokens.addresses().to_vec();
        assert!(!active.contains(&WETH));
        assert!(active.contains(&DAI));
        assert!(active.contains(&WBTC));
    }

    #[test]
    fn test_unitary_value_never_zero_under_random_flows() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let (mut chain, pool) = usdc_pool_chain();
        let users = [ALICE, BOB, OWNER];
        for user in users {
            fund(&mut chain, USDC, user, 1_000_000_000_000);
        }

        for _ in 0..300 {
            let user = users[rng.gen_range(0..users.len())];
            match rng.gen_range(0..4) {
                0 => {
                    let amount = U256::from(rng.gen_range(1u64..5_000_000_000));
                    let _ = chain.mint(user, pool, user, amount, U256::ZERO);
                }
                1 => {
                    let held = chain.pool(pool).unwrap().balance_of(&user);
                    if !held.is_zero() {
                        let share = U256::from(rng.gen_range(1u64..=100));
                        let amount = (held * share / U256::from(100)).max(U256::from(1));
                        let _ = chain.burn(user, pool, amount, U256::ZERO);
                    }
                }
                2 => {
                    // value leaks out of the pool (fees, losses)
                    let balance = chain.balance(USDC, pool);
                    let cut = balance * U256::from(rng.gen_range(0u64..50)) / U256::from(100);
                    chain.state_mut().ledger.burn(USDC, pool, cut).unwrap();
                }
                _ => {
                    let _ = chain.update_unitary_value(user, pool);
                }
            }

            let storage = chain.pool(pool).unwrap();
            if !storage.tokens.total_supply.is_zero() {
                assert!(storage.tokens.unitary_value > U256::ZERO);
            }
        }
    }
}
