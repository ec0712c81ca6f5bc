use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolValue};

use super::bad_calldata;
use crate::abi::IENavView;
use crate::chain::{Environment, WorldState};
use crate::dispatch::fallback::{CallFrame, StaticFrame, Target};
use crate::errors::{PoolError, Revert};
use crate::nav::engine::NavEngine;
use crate::transient::TransientBalanceScratch;

/// `getNavDataView()`: the NAV an update would produce, without writing it.
///
/// Runs the engine on a copy of pool storage with a private scratch map, so
/// tokens it would activate are not activated.
pub struct ENavView;

impl ENavView {
    fn view(env: &Environment, state: &WorldState, pool: Address, calldata: &[u8]) -> Result<Bytes, Revert> {
        IENavView::getNavDataViewCall::abi_decode(calldata).map_err(bad_calldata)?;
        let mut storage = state
            .pools
            .get(&pool)
            .cloned()
            .ok_or_else(|| PoolError::PoolNotFound(pool).into_revert())?;
        let mut scratch = TransientBalanceScratch::default();

        let update = NavEngine::new(
            pool,
            &mut storage,
            &state.ledger,
            &state.applications,
            &env.aggregator,
            env.oracle.as_ref(),
            &mut scratch,
        )
        .update_unitary_value()
        .map_err(PoolError::into_revert)?;

        Ok(update.components(&storage).abi_encode().into())
    }
}

impl Target for ENavView {
    fn name(&self) -> &'static str {
        "ENavView"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::view(frame.tx.env, frame.tx.state, frame.pool, calldata)
    }

    fn invoke_readonly(&self, frame: &StaticFrame<'_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::view(frame.env, frame.state, frame.pool, calldata)
    }
}
