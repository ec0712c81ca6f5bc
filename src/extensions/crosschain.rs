use alloy_primitives::Bytes;
use alloy_sol_types::SolCall;

use super::bad_calldata;
use crate::abi::{IEAcrossHandler, IECrosschain};
use crate::crosschain::{donation, handler};
use crate::crosschain::codec::DestinationParams;
use crate::dispatch::fallback::{CallFrame, Target};
use crate::errors::{PoolError, Revert};

/// `donate(token, amount, params)`
pub struct ECrosschain;

impl Target for ECrosschain {
    fn name(&self) -> &'static str {
        "ECrosschain"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        let call = IECrosschain::donateCall::abi_decode(calldata).map_err(bad_calldata)?;
        let params = DestinationParams::try_from(call.params).map_err(PoolError::into_revert)?;
        donation::donate(frame.tx, frame.pool, call.token, call.amount, params)
            .map_err(PoolError::into_revert)?;
        Ok(Bytes::new())
    }
}

/// `handleV3AcrossMessage(tokenSent, amount, relayer, message)`
pub struct EAcrossHandler;

impl Target for EAcrossHandler {
    fn name(&self) -> &'static str {
        "EAcrossHandler"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        let call = IEAcrossHandler::handleV3AcrossMessageCall::abi_decode(calldata).map_err(bad_calldata)?;
        handler::handle_across_message(
            frame.tx,
            frame.pool,
            frame.caller,
            call.tokenSent,
            call.amount,
            &call.message,
        )
        .map_err(PoolError::into_revert)?;
        Ok(Bytes::new())
    }
}
