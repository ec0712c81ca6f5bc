//! Application positions and the balance aggregator
//!
//! Applications are external position contracts a pool holds value in:
//! GRG staking and Uniswap v3/v4 liquidity NFTs. Their state lives in
//! [`ApplicationLedger`], which the pool only reads. One
//! [`ApplicationReader`] per application turns that state into signed
//! `(token, amount)` pairs; [`ApplicationAggregator`] walks the pool's
//! active-application bitmask and collects them.

use alloy_primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::abi;
use crate::errors::Revert;
use crate::pool::storage::PoolStorage;

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Application {
    GrgStaking = 0,
    UniV3Liquidity = 1,
    UniV4Liquidity = 2,
}

impl Application {
    pub const ALL: [Application; 3] = [
        Application::GrgStaking,
        Application::UniV3Liquidity,
        Application::UniV4Liquidity,
    ];

    /// Bit of this application in the packed active-applications mask.
    pub fn flag(self) -> u32 {
        1 << (self as u8)
    }

    /// Applications whose bit is set in `packed`, in discriminant order.
    pub fn unpack(packed: u32) -> Vec<Application> {
        Self::ALL
            .into_iter()
            .filter(|app| packed & app.flag() != 0)
            .collect()
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Application::GrgStaking => write!(f, "GrgStaking"),
            Application::UniV3Liquidity => write!(f, "UniV3Liquidity"),
            Application::UniV4Liquidity => write!(f, "UniV4Liquidity"),
        }
    }
}

/// Token amounts one application reports for a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationBalances {
    pub app: Application,
    pub balances: Vec<(Address, I256)>,
}

impl From<ApplicationBalances> for abi::AppTokenBalances {
    fn from(value: ApplicationBalances) -> Self {
        abi::AppTokenBalances {
            balances: value
                .balances
                .into_iter()
                .map(|(token, amount)| abi::AppTokenBalance { token, amount })
                .collect(),
            appType: U256::from(value.app as u8),
        }
    }
}

/// A concentrated-liquidity position owned by a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub owner: Address,
    pub app: Application,
    /// Current token amounts of the position, fees included.
    pub amounts: Vec<(Address, I256)>,
    /// When set, reading the position reverts with this reason.
    pub revert_reason: Option<String>,
}

/// State owned by the external application contracts.
#[derive(Debug, Clone, Default)]
pub struct ApplicationLedger {
    /// pool -> (staked token, amount)
    pub staking: HashMap<Address, (Address, U256)>,
    /// position id -> position
    pub liquidity_positions: HashMap<U256, LiquidityPosition>,
}

impl ApplicationLedger {
    pub fn staked(&self, pool: &Address) -> U256 {
        self.staking.get(pool).map(|(_, amount)| *amount).unwrap_or_default()
    }
}

// ============================================
// READERS
// ============================================

/// Reads one application's balances for a pool. Failures are reverts of the
/// position contract and propagate verbatim.
pub trait ApplicationReader: Send + Sync {
    fn token_balances(
        &self,
        apps: &ApplicationLedger,
        pool: Address,
        storage: &PoolStorage,
    ) -> Result<Vec<(Address, I256)>, Revert>;
}

pub struct StakingReader;

impl ApplicationReader for StakingReader {
    fn token_balances(
        &self,
        apps: &ApplicationLedger,
        pool: Address,
        _storage: &PoolStorage,
    ) -> Result<Vec<(Address, I256)>, Revert> {
        let Some((token, amount)) = apps.staking.get(&pool) else {
            return Ok(Vec::new());
        };
        let amount = I256::try_from(*amount)
            .map_err(|_| Revert::from_reason("StakingBalanceOverflow"))?;
        Ok(vec![(*token, amount)])
    }
}

/// Sums every position of `app` the pool has recorded.
pub struct LiquidityReader(pub Application);

impl ApplicationReader for LiquidityReader {
    fn token_balances(
        &self,
        apps: &ApplicationLedger,
        pool: Address,
        storage: &PoolStorage,
    ) -> Result<Vec<(Address, I256)>, Revert> {
        let ids = storage
            .application_positions
            .get(&self.0)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut totals: BTreeMap<Address, I256> = BTreeMap::new();
        for id in ids {
            let position = apps
                .liquidity_positions
                .get(id)
                .filter(|p| p.owner == pool && p.app == self.0)
                .ok_or_else(|| Revert::from_reason("PositionNotFound"))?;
            if let Some(reason) = &position.revert_reason {
                return Err(Revert::from_reason(reason.clone()));
            }
            for (token, amount) in &position.amounts {
                let total = totals.entry(*token).or_default();
                *total = total.saturating_add(*amount);
            }
        }
        Ok(totals.into_iter().collect())
    }
}

// ============================================
// AGGREGATOR
// ============================================

#[derive(Clone)]
pub struct ApplicationAggregator {
    readers: BTreeMap<Application, Arc<dyn ApplicationReader>>,
}

impl ApplicationAggregator {
    /// Aggregator with the stock reader for every application.
    pub fn new() -> Self {
        let mut aggregator = Self::empty();
        aggregator.register(Application::GrgStaking, Arc::new(StakingReader));
        for app in [Application::UniV3Liquidity, Application::UniV4Liquidity] {
            aggregator.register(app, Arc::new(LiquidityReader(app)));
        }
        aggregator
    }

    pub fn empty() -> Self {
        Self {
            readers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, app: Application, reader: Arc<dyn ApplicationReader>) {
        self.readers.insert(app, reader);
    }

    /// Balances of every application set in `packed`. The first reader
    /// failure aborts the whole query with that reader's revert data.
    pub fn get_app_token_balances(
        &self,
        apps: &ApplicationLedger,
        pool: Address,
        storage: &PoolStorage,
        packed: u32,
    ) -> Result<Vec<ApplicationBalances>, Revert> {
        let mut out = Vec::new();
        for app in Application::unpack(packed) {
            let reader = self
                .readers
                .get(&app)
                .ok_or_else(|| Revert::from_reason(format!("ApplicationNotSupported({})", app)))?;
            let balances = reader.token_balances(apps, pool, storage)?;
            debug!(app = %app, count = balances.len(), "application balances read");
            out.push(ApplicationBalances { app, balances });
        }
        Ok(out)
    }
}

impl Default for ApplicationAggregator {
    fn default() -> Self {
        Self::new()
    }
}
