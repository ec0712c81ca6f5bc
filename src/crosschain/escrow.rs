//! Per-pool refund escrows
//!
//! One escrow exists per `(pool, op_type)`. Bridge deposits name it as their
//! refund address, so expired or failed deposits land here instead of in the
//! pool, where they would inflate the NAV unannounced. Anyone may flush an
//! escrow with `refundVault(token)`, which replays the balance into the pool
//! through the two-step `donate` protocol with the escrow's op type.

use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use tracing::info;

use crate::abi::{IECrosschain, IEscrow};
use crate::chain::Tx;
use crate::crosschain::codec::{DestinationParams, OpType};
use crate::crosschain::donation::REGISTER_AMOUNT;
use crate::errors::PoolError;
use crate::events::PoolEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escrow {
    pub address: Address,
    pub pool: Address,
    pub op_type: OpType,
}

/// Deterministic address of the `(pool, op_type)` escrow.
pub fn escrow_address(pool: Address, op_type: OpType) -> Address {
    let salt = keccak256([op_type as u8]);
    pool.create2(salt, keccak256("smartpool.escrow"))
}

/// Deploy the escrow if it does not exist yet and return its address.
pub fn deploy(tx: &mut Tx<'_>, pool: Address, op_type: OpType) -> Address {
    let address = escrow_address(pool, op_type);
    tx.state.escrows.entry(address).or_insert_with(|| {
        info!(pool = ?pool, escrow = ?address, op = %op_type, "escrow deployed");
        Escrow {
            address,
            pool,
            op_type,
        }
    });
    address
}

/// Message call into the escrow at `to`.
pub fn handle(tx: &mut Tx<'_>, _caller: Address, to: Address, calldata: &[u8]) -> Result<Bytes, PoolError> {
    let call = IEscrow::refundVaultCall::abi_decode(calldata)
        .map_err(|err| PoolError::MessageDecoding(err.to_string()))?;
    let escrow = tx
        .state
        .escrows
        .get(&to)
        .cloned()
        .ok_or(PoolError::TargetHasNoCode(to))?;

    tx.transient.enter(escrow.address)?;
    let result = refund_vault(tx, &escrow, call.token);
    tx.transient.exit(escrow.address);
    result.map(|_| Bytes::new())
}

fn refund_vault(tx: &mut Tx<'_>, escrow: &Escrow, token: Address) -> Result<U256, PoolError> {
    if token == Address::ZERO {
        return Err(PoolError::InvalidToken);
    }
    if !tx.env.config.crosschain_tokens.contains(&token) {
        return Err(PoolError::UnsupportedToken(token));
    }
    let balance = tx.state.ledger.balance_of(token, escrow.address)?;
    if balance.is_zero() {
        return Err(PoolError::InvalidAmount);
    }

    let params = DestinationParams {
        op_type: escrow.op_type,
        should_unwrap_native: false,
    };
    let register = donate_calldata(token, U256::from(REGISTER_AMOUNT), params);
    tx.call(escrow.address, escrow.pool, &register)?;

    tx.state.ledger.transfer(token, escrow.address, escrow.pool, balance)?;

    let credit = donate_calldata(token, balance, params);
    tx.call(escrow.address, escrow.pool, &credit)?;

    tx.emit(PoolEvent::TokensDonated {
        pool: escrow.pool,
        token,
        amount: balance,
        op_type: escrow.op_type,
    });
    info!(pool = ?escrow.pool, escrow = ?escrow.address, token = ?token, amount = %balance, "escrow refunded");
    Ok(balance)
}

fn donate_calldata(token: Address, amount: U256, params: DestinationParams) -> Vec<u8> {
    IECrosschain::donateCall {
        token,
        amount,
        params: params.into(),
    }
    .abi_encode()
}
