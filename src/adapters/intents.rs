use alloy_primitives::{Address, Bytes, I256, U256};
use alloy_sol_types::SolCall;
use tracing::info;

use crate::abi::{AcrossParams, IAIntents};
use crate::chain::Tx;
use crate::crosschain::bridge::{Deposit, DepositStatus};
use crate::crosschain::codec::{DestinationParams, Message, OpType, SourceParams};
use crate::crosschain::escrow;
use crate::dispatch::fallback::{CallFrame, Target};
use crate::errors::{PoolError, Revert};
use crate::events::PoolEvent;
use crate::extensions::bad_calldata;

/// `depositV3(params)`: source side of a cross-chain move.
///
/// Transfer books the outgoing amount as a positive virtual balance, so the
/// source NAV does not move while the tokens are in flight. Sync lets the
/// value leave and tells the destination which NAV to align with.
pub struct AIntents;

impl Target for AIntents {
    fn name(&self) -> &'static str {
        "AIntents"
    }

    fn required_version(&self) -> Option<String> {
        Some("4.0.0".to_string())
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        let call = IAIntents::depositV3Call::abi_decode(calldata).map_err(bad_calldata)?;
        deposit_v3(frame.tx, frame.pool, call.params).map_err(PoolError::into_revert)?;
        Ok(Bytes::new())
    }
}

fn deposit_v3(tx: &mut Tx<'_>, pool: Address, params: AcrossParams) -> Result<u32, PoolError> {
    let source = SourceParams::try_from(params.sourceParams)?;
    if source.op_type == OpType::Unknown {
        return Err(PoolError::InvalidOpType(OpType::Unknown as u8));
    }
    let config = &tx.env.config;
    if !config.crosschain_tokens.contains(&params.inputToken) {
        return Err(PoolError::UnsupportedToken(params.inputToken));
    }
    if params.inputAmount.is_zero() || params.outputAmount.is_zero() {
        return Err(PoolError::InvalidAmount);
    }
    let destination_chain_id =
        u64::try_from(params.destinationChainId).map_err(|_| PoolError::Overflow)?;

    if !source.source_native_amount.is_zero() {
        if params.inputToken != config.wrapped_native {
            return Err(PoolError::InvalidToken);
        }
        tx.state.ledger.wrap_native(pool, source.source_native_amount)?;
    }

    let nav = tx.update_nav(pool)?;
    let decimals = tx.pool(pool)?.decimals();

    let nav_tolerance = match source.op_type {
        OpType::Transfer => {
            let delta = I256::try_from(params.inputAmount).map_err(|_| PoolError::Overflow)?;
            let balance = tx
                .pool_mut(pool)?
                .adjust_virtual_balance(params.inputToken, delta)?;
            tx.emit(PoolEvent::VirtualBalanceUpdated {
                pool,
                token: params.inputToken,
                delta,
                balance,
            });
            U256::ZERO
        }
        OpType::Sync => {
            if source.nav_tolerance > U256::from(tx.env.config.max_nav_tolerance_bps) {
                return Err(PoolError::InvalidNavTolerance(source.nav_tolerance));
            }
            source.nav_tolerance
        }
        OpType::Unknown => return Err(PoolError::InvalidOpType(OpType::Unknown as u8)),
    };

    let refund_address = escrow::deploy(tx, pool, source.op_type);
    let message = Message {
        params: DestinationParams {
            op_type: source.op_type,
            should_unwrap_native: source.should_unwrap_on_destination,
        },
        source_chain_id: U256::from(tx.env.config.chain_id),
        source_nav: nav.unitary_value,
        source_decimals: decimals,
        nav_tolerance,
    };

    let custody = tx.state.spoke_pool.address();
    tx.state
        .ledger
        .transfer(params.inputToken, pool, custody, params.inputAmount)?;

    let fill_deadline = match params.fillDeadline {
        0 => tx.state.timestamp + u64::from(tx.env.config.fill_window_secs),
        deadline => u64::from(deadline),
    };
    let deposit_id = tx.state.spoke_pool.deposit(Deposit {
        depositor: pool,
        recipient: pool,
        refund_address,
        input_token: params.inputToken,
        output_token: params.outputToken,
        input_amount: params.inputAmount,
        output_amount: params.outputAmount,
        destination_chain_id,
        fill_deadline,
        message: message.encode(),
        status: DepositStatus::Pending,
    });

    tx.emit(PoolEvent::CrosschainDeposit {
        pool,
        deposit_id,
        input_token: params.inputToken,
        input_amount: params.inputAmount,
        destination_chain_id,
        op_type: source.op_type,
        refund_address,
    });
    info!(
        pool = ?pool,
        deposit_id,
        token = ?params.inputToken,
        amount = %params.inputAmount,
        destination_chain_id,
        op = %source.op_type,
        "bridge deposit"
    );
    Ok(deposit_id)
}
