//! NAV engine
//!
//! Computes a pool's total value in base-token units and derives the
//! unitary value (price per share) from it.
//!
//! VALUATION:
//! 1. Application balances and virtual balances are folded into the
//!    transaction's scratch map. The first touch of a token offers it to the
//!    active token set.
//! 2. Every active token plus the base token (last) is read from the ledger
//!    and added to its scratch amount. An unreadable non-base token is skipped.
//! 3. Wrapped native merges into native, each token is converted to the base
//!    token once, and the signed values split into assets and liabilities.
//!
//! unitary_value = max(net_value, 1) * 10^decimals / total_supply

use alloy_primitives::{Address, I256, U256};
use tracing::{debug, info, warn};

use crate::abi;
use crate::errors::PoolError;
use crate::ledger::Ledger;
use crate::nav::applications::{ApplicationAggregator, ApplicationLedger};
use crate::oracle::{pow10, Oracle};
use crate::pool::storage::PoolStorage;
use crate::transient::TransientBalanceScratch;
use std::collections::BTreeMap;

// ============================================
// TYPES
// ============================================

/// Pool value split into gross assets and gross liabilities (base units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolValuation {
    pub assets: U256,
    pub liabilities: U256,
}

impl PoolValuation {
    pub fn net(&self) -> I256 {
        let assets = I256::try_from(self.assets).unwrap_or(I256::MAX);
        let liabilities = I256::try_from(self.liabilities).unwrap_or(I256::MAX);
        assets.saturating_sub(liabilities)
    }

    /// Net value, floored at one so callers never divide by zero.
    pub fn total_pool_value(&self) -> U256 {
        let net = self.net();
        if net.is_positive() {
            net.into_raw()
        } else {
            U256::from(1)
        }
    }

    pub fn net_total_value(&self) -> U256 {
        self.assets.saturating_sub(self.liabilities)
    }

    pub fn net_total_liabilities(&self) -> U256 {
        self.liabilities.saturating_sub(self.assets)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavUpdateKind {
    /// First update: unitary value set to `10^decimals`
    Seeded,
    /// Stored value kept (no supply)
    Unchanged,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavUpdate {
    pub kind: NavUpdateKind,
    pub unitary_value: U256,
    pub total_supply: U256,
    pub valuation: Option<PoolValuation>,
    /// Tokens added to the active set while valuing the pool
    pub activated: Vec<Address>,
}

impl NavUpdate {
    pub fn components(&self, storage: &PoolStorage) -> abi::NavComponents {
        let valuation = self.valuation.unwrap_or_default();
        abi::NavComponents {
            unitaryValue: self.unitary_value,
            totalSupply: self.total_supply,
            baseToken: storage.base_token(),
            decimals: storage.decimals(),
            netTotalValue: valuation.net_total_value(),
            netTotalLiabilities: valuation.net_total_liabilities(),
        }
    }
}

// ============================================
// ENGINE
// ============================================

/// NAV computation for one pool inside one transaction.
pub struct NavEngine<'a> {
    pool: Address,
    storage: &'a mut PoolStorage,
    ledger: &'a Ledger,
    apps: &'a ApplicationLedger,
    aggregator: &'a ApplicationAggregator,
    oracle: &'a dyn Oracle,
    scratch: &'a mut TransientBalanceScratch,
    activated: Vec<Address>,
}

impl<'a> NavEngine<'a> {
    pub fn new(
        pool: Address,
        storage: &'a mut PoolStorage,
        ledger: &'a Ledger,
        apps: &'a ApplicationLedger,
        aggregator: &'a ApplicationAggregator,
        oracle: &'a dyn Oracle,
        scratch: &'a mut TransientBalanceScratch,
    ) -> Self {
        Self {
            pool,
            storage,
            ledger,
            apps,
            aggregator,
            oracle,
            scratch,
            activated: Vec::new(),
        }
    }

    /// Refresh and persist the pool's unitary value.
    pub fn update_unitary_value(mut self) -> Result<NavUpdate, PoolError> {
        let decimals = self.storage.decimals();
        let total_supply = self.storage.tokens.total_supply;

        if self.storage.tokens.unitary_value.is_zero() {
            let seeded = pow10(decimals);
            self.storage.tokens.unitary_value = seeded;
            info!(pool = ?self.pool, unitary_value = %seeded, "unitary value seeded");
            return Ok(self.finish(NavUpdateKind::Seeded, None));
        }

        if total_supply.is_zero() {
            return Ok(self.finish(NavUpdateKind::Unchanged, None));
        }

        let valuation = self.compute_valuation()?;
        let net = valuation.net();
        if !net.is_positive() {
            warn!(pool = ?self.pool, net = %net, "non-positive pool value, valuing at one base unit");
        }

        let unitary_value = valuation
            .total_pool_value()
            .checked_mul(pow10(decimals))
            .ok_or(PoolError::Overflow)?
            / total_supply;
        if unitary_value.is_zero() {
            return Err(PoolError::UnitaryValueIsZero);
        }

        self.storage.tokens.unitary_value = unitary_value;
        info!(
            pool = ?self.pool,
            unitary_value = %unitary_value,
            total_supply = %total_supply,
            "unitary value updated"
        );
        Ok(self.finish(NavUpdateKind::Updated, Some(valuation)))
    }

    /// Total pool value in base-token units, activating newly seen tokens.
    pub fn compute_valuation(&mut self) -> Result<PoolValuation, PoolError> {
        let base = self.storage.base_token();
        let wrapped_native = self.ledger.wrapped_native();

        // 1. applications
        let packed = self.storage.active_applications;
        if packed != 0 {
            let reports = self.aggregator.get_app_token_balances(
                self.apps,
                self.pool,
                self.storage,
                packed,
            )?;
            for report in reports {
                for (token, amount) in report.balances {
                    if !amount.is_zero() {
                        self.fold(token, amount, base)?;
                    }
                }
            }
        }

        // 2. virtual balances
        let virtuals: Vec<(Address, I256)> = self
            .storage
            .virtual_balances
            .iter()
            .map(|(token, amount)| (*token, *amount))
            .collect();
        for (token, amount) in virtuals {
            if !amount.is_zero() {
                self.fold(token, amount, base)?;
            }
        }

        if !self.storage.active_tokens.is_empty() && !self.oracle.has_price_feed(base) {
            return Err(PoolError::BaseTokenPriceFeed);
        }

        // 3. on-chain balances, base token last
        let mut tokens = self.storage.active_tokens.addresses().to_vec();
        tokens.push(base);

        let normalize = |token: Address| {
            if token == wrapped_native {
                Address::ZERO
            } else {
                token
            }
        };
        let mut merged: BTreeMap<Address, I256> = BTreeMap::new();
        for token in tokens {
            let mut amount = self.scratch.take(&token).unwrap_or_default();
            match self.ledger.balance_of(token, self.pool) {
                Ok(balance) => {
                    let balance = I256::try_from(balance).map_err(|_| PoolError::Overflow)?;
                    amount = amount.saturating_add(balance);
                }
                Err(_) if token == base => return Err(PoolError::BaseTokenBalance),
                Err(revert) => {
                    warn!(pool = ?self.pool, token = ?token, reason = %revert, "skipping unreadable token balance");
                }
            }
            if !amount.is_zero() {
                let slot = merged.entry(normalize(token)).or_default();
                *slot = slot.saturating_add(amount);
            }
        }

        // 4. convert and split
        let base_normalized = normalize(base);
        let mut valuation = PoolValuation::default();
        for (token, amount) in merged {
            if amount.is_zero() {
                continue;
            }
            let value = if token == base_normalized {
                amount
            } else {
                self.oracle.convert_token_amount(token, amount, base)?
            };
            debug!(token = ?token, amount = %amount, value = %value, "token valued");
            if value.is_negative() {
                valuation.liabilities = valuation.liabilities.saturating_add(value.unsigned_abs());
            } else {
                valuation.assets = valuation.assets.saturating_add(value.into_raw());
            }
        }

        Ok(valuation)
    }

    fn fold(&mut self, token: Address, amount: I256, base: Address) -> Result<(), PoolError> {
        if self.scratch.fold_contribution(token, amount)
            && self
                .storage
                .active_tokens
                .add_unique(self.oracle, token, base)?
        {
            self.activated.push(token);
        }
        Ok(())
    }

    fn finish(self, kind: NavUpdateKind, valuation: Option<PoolValuation>) -> NavUpdate {
        NavUpdate {
            kind,
            unitary_value: self.storage.tokens.unitary_value,
            total_supply: self.storage.tokens.total_supply,
            valuation,
            activated: self.activated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Revert;
    use alloy_primitives::address;
    use crate::nav::applications::{Application, ApplicationReader};
    use crate::oracle::PriceFeedOracle;
    use crate::pool::storage::PoolParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const POOL: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");
    const WETH: Address = address!("7777777777777777777777777777777777777777");
    const BASE: Address = address!("babababababababababababababababababababa");
    const GOOD: Address = address!("6060606060606060606060606060606060606060");
    const BROKEN: Address = address!("bebebebebebebebebebebebebebebebebebebebe");

    fn i256(v: i64) -> I256 {
        I256::try_from(v).unwrap()
    }

    /// Oracle that counts every query it receives.
    struct CountingOracle {
        inner: PriceFeedOracle,
        calls: AtomicUsize,
    }

    impl Oracle for CountingOracle {
        fn has_price_feed(&self, token: Address) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.has_price_feed(token)
        }

        fn convert_token_amount(&self, token: Address, amount: I256, target: Address) -> Result<I256, Revert> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.convert_token_amount(token, amount, target)
        }
    }

    struct FailingReader(&'static str);

    impl ApplicationReader for FailingReader {
        fn token_balances(
            &self,
            _apps: &ApplicationLedger,
            _pool: Address,
            _storage: &PoolStorage,
        ) -> Result<Vec<(Address, I256)>, Revert> {
            Err(Revert::from_reason(self.0))
        }
    }

    struct Fixture {
        storage: PoolStorage,
        ledger: Ledger,
        apps: ApplicationLedger,
        aggregator: ApplicationAggregator,
        oracle: CountingOracle,
        scratch: TransientBalanceScratch,
    }

    impl Fixture {
        fn new(decimals: u8) -> Self {
            let inner = PriceFeedOracle::new(WETH);
            // 1:1 with each other, both 18 decimals unless overridden
            inner.update_price(BASE, pow10(18), decimals);
            inner.update_price(GOOD, pow10(18), decimals);
            inner.update_price(BROKEN, pow10(18), decimals);
            Self {
                storage: PoolStorage::new(PoolParams {
                    name: "Engine".into(),
                    symbol: "ENG".into(),
                    owner: Address::repeat_byte(0x0a),
                    base_token: BASE,
                    decimals,
                }),
                ledger: Ledger::new(WETH),
                apps: ApplicationLedger::default(),
                aggregator: ApplicationAggregator::new(),
                oracle: CountingOracle {
                    inner,
                    calls: AtomicUsize::new(0),
                },
                scratch: TransientBalanceScratch::default(),
            }
        }

        fn engine(&mut self) -> NavEngine<'_> {
            NavEngine::new(
                POOL,
                &mut self.storage,
                &self.ledger,
                &self.apps,
                &self.aggregator,
                &self.oracle,
                &mut self.scratch,
            )
        }

        fn oracle_calls(&self) -> usize {
            self.oracle.calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_bootstrap_seeds_without_queries() {
        let mut fx = Fixture::new(6);
        fx.ledger.break_token(BASE, "must not be read");

        let update = fx.engine().update_unitary_value().unwrap();
        assert_eq!(update.kind, NavUpdateKind::Seeded);
        assert_eq!(update.unitary_value, U256::from(1_000_000u64));
        assert_eq!(fx.storage.tokens.unitary_value, U256::from(1_000_000u64));
        assert_eq!(fx.oracle_calls(), 0);
    }

    #[test]
    fn test_zero_supply_keeps_stored_value() {
        let mut fx = Fixture::new(18);
        fx.storage.tokens.unitary_value = U256::from(42);
        let update = fx.engine().update_unitary_value().unwrap();
        assert_eq!(update.kind, NavUpdateKind::Unchanged);
        assert_eq!(fx.storage.tokens.unitary_value, U256::from(42));
        assert_eq!(fx.oracle_calls(), 0);
    }

    #[test]
    fn test_skip_on_bad_token() {
        let mut fx = Fixture::new(18);
        let oracle = &fx.oracle;
        fx.storage.active_tokens.add_unique(oracle, GOOD, BASE).unwrap();
        fx.storage.active_tokens.add_unique(oracle, BROKEN, BASE).unwrap();
        fx.ledger.mint(GOOD, POOL, U256::from(100));
        fx.ledger.mint(BROKEN, POOL, U256::from(1_000));
        fx.ledger.break_token(BROKEN, "BalanceOfReverted");
        fx.ledger.mint(BASE, POOL, U256::from(5));

        let valuation = fx.engine().compute_valuation().unwrap();
        assert_eq!(valuation.assets, U256::from(105));
        assert_eq!(valuation.liabilities, U256::ZERO);
        assert!(fx.scratch.is_empty());
    }

    #[test]
    fn test_broken_token_keeps_virtual_contribution() {
        let mut fx = Fixture::new(18);
        fx.storage.active_tokens.add_unique(&fx.oracle, BROKEN, BASE).unwrap();
        fx.ledger.break_token(BROKEN, "BalanceOfReverted");
        fx.storage.adjust_virtual_balance(BROKEN, i256(-30)).unwrap();
        fx.ledger.mint(BASE, POOL, U256::from(100));

        let valuation = fx.engine().compute_valuation().unwrap();
        assert_eq!(valuation.assets, U256::from(100));
        assert_eq!(valuation.liabilities, U256::from(30));
        assert_eq!(valuation.net(), i256(70));
    }

    #[test]
    fn test_base_balance_failure_is_fatal() {
        let mut fx = Fixture::new(18);
        fx.ledger.break_token(BASE, "Paused");
        let err = fx.engine().compute_valuation().unwrap_err();
        assert_eq!(err, PoolError::BaseTokenBalance);
    }

    #[test]
    fn test_fatal_on_bad_application() {
        let mut fx = Fixture::new(18);
        fx.aggregator
            .register(Application::UniV3Liquidity, Arc::new(FailingReader("PositionManagerPaused")));
        fx.storage.set_application_active(Application::UniV3Liquidity, true);
        fx.storage.tokens.unitary_value = U256::from(1_000);
        fx.storage.tokens.total_supply = U256::from(10);

        let err = fx.engine().update_unitary_value().unwrap_err();
        assert_eq!(err.into_revert().reason().as_deref(), Some("PositionManagerPaused"));
        assert_eq!(fx.storage.tokens.unitary_value, U256::from(1_000));
    }

    #[test]
    fn test_application_token_activated_once() {
        let mut fx = Fixture::new(18);
        fx.storage.set_application_active(Application::GrgStaking, true);
        fx.apps.staking.insert(POOL, (GOOD, U256::from(50)));
        fx.storage.adjust_virtual_balance(GOOD, i256(10)).unwrap();
        fx.storage.tokens.unitary_value = pow10(18);
        fx.storage.tokens.total_supply = U256::from(60);

        let update = fx.engine().update_unitary_value().unwrap();
        assert_eq!(update.activated, vec![GOOD]);
        assert_eq!(fx.storage.active_tokens.addresses(), &[GOOD]);
        // 60 units of value over 60 shares
        assert_eq!(fx.storage.tokens.unitary_value, pow10(18));

        let again = fx.engine().update_unitary_value().unwrap();
        assert!(again.activated.is_empty());
    }

    #[test]
    fn test_missing_base_feed_with_active_tokens() {
        let mut fx = Fixture::new(18);
        fx.storage.active_tokens.add_unique(&fx.oracle, GOOD, BASE).unwrap();
        fx.oracle.inner.remove_price(BASE);
        let err = fx.engine().compute_valuation().unwrap_err();
        assert_eq!(err, PoolError::BaseTokenPriceFeed);
    }

    #[test]
    fn test_wrapped_native_merges_into_native() {
        let mut fx = Fixture::new(18);
        fx.storage.active_tokens.add_unique(&fx.oracle, WETH, BASE).unwrap();
        fx.storage.active_tokens.add_unique(&fx.oracle, Address::ZERO, BASE).unwrap();
        fx.ledger.mint(WETH, POOL, U256::from(3));
        fx.ledger.mint(Address::ZERO, POOL, U256::from(4));

        let before = fx.oracle_calls();
        let valuation = fx.engine().compute_valuation().unwrap();
        assert_eq!(valuation.assets, U256::from(7));
        // one base feed check, one conversion for the merged native amount
        assert_eq!(fx.oracle_calls() - before, 2);
    }

    #[test]
    fn test_liabilities_above_assets_floor_value() {
        let mut fx = Fixture::new(18);
        fx.storage.tokens.unitary_value = U256::from(77);
        fx.storage.tokens.total_supply = U256::from(10);
        fx.ledger.mint(BASE, POOL, U256::from(3));
        fx.storage.adjust_virtual_balance(BASE, i256(-5)).unwrap();

        let update = fx.engine().update_unitary_value().unwrap();
        assert_eq!(update.kind, NavUpdateKind::Updated);
        let valuation = update.valuation.unwrap();
        assert_eq!(valuation.net_total_liabilities(), U256::from(2));
        assert_eq!(valuation.total_pool_value(), U256::from(1));
        // one base unit spread over ten shares
        assert_eq!(fx.storage.tokens.unitary_value, pow10(17));
    }

    #[test]
    fn test_dust_value_is_fatal() {
        let mut fx = Fixture::new(0);
        fx.storage.tokens.unitary_value = U256::from(1);
        fx.storage.tokens.total_supply = U256::from(10);
        fx.ledger.mint(BASE, POOL, U256::from(3));

        let err = fx.engine().update_unitary_value().unwrap_err();
        assert_eq!(err, PoolError::UnitaryValueIsZero);
        assert_eq!(fx.storage.tokens.unitary_value, U256::from(1));
    }
}
