use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use tracing::info;

use crate::abi::IAStaking::IAStakingCalls;
use crate::chain::Tx;
use crate::dispatch::fallback::{CallFrame, Target};
use crate::errors::{PoolError, Revert};
use crate::extensions::bad_calldata;
use crate::nav::applications::Application;

/// `stake(amount)` / `undelegateStake(amount)` of GRG held by the pool.
///
/// Staked GRG leaves the pool's token balance and shows up in the NAV through
/// the `GrgStaking` application instead.
pub struct AStaking;

impl Target for AStaking {
    fn name(&self) -> &'static str {
        "AStaking"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        let result = match IAStakingCalls::abi_decode(calldata).map_err(bad_calldata)? {
            IAStakingCalls::stake(call) => stake(frame.tx, frame.pool, call.amount),
            IAStakingCalls::undelegateStake(call) => undelegate(frame.tx, frame.pool, call.amount),
        };
        result.map_err(PoolError::into_revert)?;
        Ok(Bytes::new())
    }
}

fn stake(tx: &mut Tx<'_>, pool: Address, amount: U256) -> Result<(), PoolError> {
    if amount.is_zero() {
        return Err(PoolError::InvalidAmount);
    }
    let grg = tx.env.config.grg_token;
    let proxy = tx.env.config.staking_proxy;

    tx.state.ledger.transfer(grg, pool, proxy, amount)?;
    let entry = tx.state.applications.staking.entry(pool).or_insert((grg, U256::ZERO));
    entry.1 = entry.1.checked_add(amount).ok_or(PoolError::Overflow)?;
    tx.pool_mut(pool)?.set_application_active(Application::GrgStaking, true);

    info!(pool = ?pool, amount = %amount, "grg staked");
    Ok(())
}

fn undelegate(tx: &mut Tx<'_>, pool: Address, amount: U256) -> Result<(), PoolError> {
    if amount.is_zero() {
        return Err(PoolError::InvalidAmount);
    }
    let grg = tx.env.config.grg_token;
    let proxy = tx.env.config.staking_proxy;

    let staked = tx.state.applications.staked(&pool);
    if staked < amount {
        return Err(PoolError::InsufficientBalance { token: grg, holder: pool });
    }
    let rest = staked - amount;
    if rest.is_zero() {
        tx.state.applications.staking.remove(&pool);
        tx.pool_mut(pool)?.set_application_active(Application::GrgStaking, false);
    } else {
        tx.state.applications.staking.insert(pool, (grg, rest));
    }
    tx.state.ledger.transfer(grg, proxy, pool, amount)?;

    info!(pool = ?pool, amount = %amount, remaining = %rest, "grg unstaked");
    Ok(())
}
