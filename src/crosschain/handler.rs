//! Destination-side handling of bridge fills
//!
//! The spoke pool transfers the relayed tokens to the pool, then calls
//! `handleV3AcrossMessage` on it. The message decides how the tokens are
//! booked:
//!
//! - Transfer: offset by a negative virtual balance (NAV-neutral)
//! - Sync: booked as value, then the resulting unitary value must sit
//!   within `nav_tolerance` bps of the source chain's unitary value

use alloy_primitives::{Address, U256};
use tracing::{info, warn};

use crate::chain::Tx;
use crate::crosschain::codec::{Message, OpType};
use crate::crosschain::donation;
use crate::errors::PoolError;
use crate::events::PoolEvent;
use crate::oracle::checked_pow10;

const BPS: u64 = 10_000;

pub fn handle_across_message(
    tx: &mut Tx<'_>,
    pool: Address,
    caller: Address,
    token: Address,
    amount: U256,
    message: &[u8],
) -> Result<(), PoolError> {
    if caller != tx.env.config.spoke_pool {
        return Err(PoolError::CallerIsNotSpokePool(caller));
    }

    let message = Message::decode(message)?;
    let op_type = message.params.op_type;
    if op_type == OpType::Unknown {
        return Err(PoolError::InvalidOpType(op_type as u8));
    }
    if amount.is_zero() {
        return Err(PoolError::InvalidAmount);
    }

    let held = tx.state.ledger.balance_of(token, pool)?;
    if held < amount {
        return Err(PoolError::InsufficientBalance { token, holder: pool });
    }

    donation::credit(tx, pool, token, amount, message.params)?;

    if op_type == OpType::Sync {
        check_nav_tolerance(tx, pool, &message)?;
    }

    tx.emit(PoolEvent::CrosschainMessageReceived {
        pool,
        token,
        amount,
        op_type,
        source_chain_id: message.source_chain_id,
    });
    info!(pool = ?pool, token = ?token, amount = %amount, op = %op_type, "bridge message handled");
    Ok(())
}

/// Update the destination NAV and compare it with the source NAV.
///
/// A pool without supply has nothing to align; its unitary value only
/// gets seeded.
fn check_nav_tolerance(tx: &mut Tx<'_>, pool: Address, message: &Message) -> Result<(), PoolError> {
    let max = U256::from(tx.env.config.max_nav_tolerance_bps);
    if message.nav_tolerance > max {
        return Err(PoolError::InvalidNavTolerance(message.nav_tolerance));
    }

    let update = tx.update_nav(pool)?;
    if update.total_supply.is_zero() {
        return Ok(());
    }

    let decimals = tx.pool(pool)?.decimals();
    let source_nav = rescale(message.source_nav, message.source_decimals, decimals)?;
    let destination_nav = update.unitary_value;
    if source_nav.is_zero() {
        return Err(PoolError::NavToleranceExceeded {
            source_nav,
            destination_nav,
            tolerance_bps: message.nav_tolerance,
        });
    }

    let deviation = destination_nav
        .abs_diff(source_nav)
        .checked_mul(U256::from(BPS))
        .map_or(U256::MAX, |scaled| scaled / source_nav);
    if deviation > message.nav_tolerance {
        warn!(
            pool = ?pool,
            source_nav = %source_nav,
            destination_nav = %destination_nav,
            deviation_bps = %deviation,
            "sync outside tolerance"
        );
        return Err(PoolError::NavToleranceExceeded {
            source_nav,
            destination_nav,
            tolerance_bps: message.nav_tolerance,
        });
    }
    Ok(())
}

/// Express `value` (with `from` decimals) with `to` decimals.
fn rescale(value: U256, from: u8, to: u8) -> Result<U256, PoolError> {
    if from <= to {
        checked_pow10(to - from)
            .and_then(|scale| value.checked_mul(scale))
            .ok_or(PoolError::Overflow)
    } else {
        // past 10^77 every value scales down to zero
        Ok(checked_pow10(from - to).map_or(U256::ZERO, |scale| value / scale))
    }
}
