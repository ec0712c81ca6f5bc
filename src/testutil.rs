//! Shared fixtures for unit tests.

use alloy_primitives::{address, Address, U256};
use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::{Chain, ChainConfig};
use crate::oracle::{pow10, PriceFeedOracle};
use crate::pool::storage::PoolParams;
pub use crate::tokens::{DAI, GRG, USDC, WBTC, WETH};

pub const OWNER: Address = address!("00000000000000000000000000000000000a11ce");
pub const ALICE: Address = address!("000000000000000000000000000000000000a1a1");
pub const BOB: Address = address!("0000000000000000000000000000000000000b0b");
pub const RELAYER: Address = address!("000000000000000000000000000000000000f111");
pub const GOVERNANCE: Address = address!("0000000000000000000000000000000000006070");
pub const SPOKE_POOL: Address = address!("5c7BCd6E7De5423a257D81B442095A1a6ced35C5");
pub const STAKING_PROXY: Address = address!("730dDf7b602dB822043e0409d8926440395e07fE");

pub fn chain_config(chain_id: u64) -> ChainConfig {
    ChainConfig {
        chain_id,
        wrapped_native: WETH,
        pool_version: "4.1.0".to_string(),
        spoke_pool: SPOKE_POOL,
        crosschain_tokens: HashSet::from([USDC, WETH]),
        max_nav_tolerance_bps: 1_000,
        fill_window_secs: 3_600,
        governance: GOVERNANCE,
        grg_token: GRG,
        staking_proxy: STAKING_PROXY,
    }
}

/// Oracle at ETH = 2000 USD, stablecoins at 1 USD.
pub fn test_oracle() -> Arc<PriceFeedOracle> {
    let oracle = PriceFeedOracle::new(WETH);
    let usd = pow10(18) / U256::from(2_000u64);
    oracle.update_price(USDC, usd, 6);
    oracle.update_price(DAI, usd, 18);
    oracle.update_price(WBTC, U256::from(30u64) * pow10(18), 8);
    oracle.update_price(GRG, usd / U256::from(4u64), 18);
    Arc::new(oracle)
}

pub fn test_chain(chain_id: u64) -> (Chain, Arc<PriceFeedOracle>) {
    let oracle = test_oracle();
    (Chain::new(chain_config(chain_id), oracle.clone()), oracle)
}

pub fn usdc_pool_params() -> PoolParams {
    PoolParams {
        name: "USDC Growth".into(),
        symbol: "UGRO".into(),
        owner: OWNER,
        base_token: USDC,
        decimals: 6,
    }
}

/// Chain 1 with a freshly deployed USDC pool.
pub fn usdc_pool_chain() -> (Chain, Address) {
    let (mut chain, _) = test_chain(1);
    let pool = chain.deploy_pool(usdc_pool_params()).unwrap();
    (chain, pool)
}

pub fn fund(chain: &mut Chain, token: Address, holder: Address, amount: u64) {
    chain.state_mut().ledger.mint(token, holder, U256::from(amount));
}
