//! Two-step donation protocol
//!
//! `donate(token, 1, params)` registers: the pool's current balance of the
//! token is snapshotted in transient storage. Nothing else changes, so a
//! register alone cannot touch the active token set.
//! `donate(token, amount, params)` then credits: the balance must have grown
//! by at least `amount` since the snapshot, so nobody can credit value that
//! did not arrive. Once a snapshot is pending, an amount of 1 credits too.

use alloy_primitives::{Address, I256, U256};
use tracing::{debug, info};

use crate::chain::Tx;
use crate::crosschain::codec::{DestinationParams, OpType};
use crate::errors::PoolError;
use crate::events::PoolEvent;

/// Amount that marks the register step.
pub const REGISTER_AMOUNT: u64 = 1;

pub fn donate(
    tx: &mut Tx<'_>,
    pool: Address,
    token: Address,
    amount: U256,
    params: DestinationParams,
) -> Result<(), PoolError> {
    if amount.is_zero() {
        return Err(PoolError::InvalidAmount);
    }
    if params.op_type == OpType::Unknown {
        return Err(PoolError::InvalidOpType(OpType::Unknown as u8));
    }

    if amount == U256::from(REGISTER_AMOUNT) && !tx.transient.has_donation(pool, token) {
        let pre_balance = tx.state.ledger.balance_of(token, pool)?;
        tx.transient.record_donation(pool, token, pre_balance);
        debug!(pool = ?pool, token = ?token, pre_balance = %pre_balance, "donation registered");
        return Ok(());
    }

    let pre_balance = tx
        .transient
        .take_donation(pool, token)
        .ok_or(PoolError::DonationNotInitialized(token))?;
    let post_balance = tx.state.ledger.balance_of(token, pool)?;
    let received = post_balance.saturating_sub(pre_balance);
    if received < amount {
        return Err(PoolError::DonationBalanceMismatch {
            expected: amount,
            received,
        });
    }

    credit(tx, pool, token, amount, params)
}

/// Book `amount` of `token` that already sits in the pool.
///
/// Transfer offsets the amount with a negative virtual balance so the NAV
/// does not move; Sync books it as real value.
pub fn credit(
    tx: &mut Tx<'_>,
    pool: Address,
    token: Address,
    amount: U256,
    params: DestinationParams,
) -> Result<(), PoolError> {
    let mut token = token;
    if params.should_unwrap_native && token == tx.env.config.wrapped_native {
        tx.state.ledger.unwrap_native(pool, amount)?;
        token = Address::ZERO;
    }
    tx.activate_token(pool, token)?;

    match params.op_type {
        OpType::Transfer => {
            let delta = I256::try_from(amount).map_err(|_| PoolError::Overflow)?;
            let balance = tx.pool_mut(pool)?.adjust_virtual_balance(token, -delta)?;
            tx.emit(PoolEvent::VirtualBalanceUpdated {
                pool,
                token,
                delta: -delta,
                balance,
            });
        }
        OpType::Sync => {}
        OpType::Unknown => return Err(PoolError::InvalidOpType(OpType::Unknown as u8)),
    }

    info!(pool = ?pool, token = ?token, amount = %amount, op = %params.op_type, "tokens credited");
    Ok(())
}
