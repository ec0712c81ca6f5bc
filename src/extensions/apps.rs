use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolValue};

use super::bad_calldata;
use crate::abi::{AppTokenBalances, IEApps};
use crate::chain::{Environment, WorldState};
use crate::dispatch::fallback::{CallFrame, StaticFrame, Target};
use crate::errors::Revert;

/// `getAppTokenBalances(packedApplications)`
///
/// Reports the token balances of every application in the mask, whether or
/// not the pool has it flagged active.
pub struct EApps;

impl EApps {
    fn read(env: &Environment, state: &WorldState, pool: Address, calldata: &[u8]) -> Result<Bytes, Revert> {
        let call = IEApps::getAppTokenBalancesCall::abi_decode(calldata).map_err(bad_calldata)?;
        let packed = u32::try_from(call.packedApplications)
            .map_err(|_| Revert::from_reason("InvalidApplicationMask"))?;
        let storage = state
            .pools
            .get(&pool)
            .ok_or_else(|| Revert::from_reason("PoolNotFound"))?;

        let balances: Vec<AppTokenBalances> = env
            .aggregator
            .get_app_token_balances(&state.applications, pool, storage, packed)?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(balances.abi_encode().into())
    }
}

impl Target for EApps {
    fn name(&self) -> &'static str {
        "EApps"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::read(frame.tx.env, frame.tx.state, frame.pool, calldata)
    }

    fn invoke_readonly(&self, frame: &StaticFrame<'_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::read(frame.env, frame.state, frame.pool, calldata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::applications::Application;
    use crate::testutil::*;
    use alloy_primitives::{I256, U256};

    #[test]
    fn test_reports_staking_balance_through_pool() {
        let (mut chain, pool) = usdc_pool_chain();
        chain
            .state_mut()
            .applications
            .staking
            .insert(pool, (GRG, U256::from(1_000u64)));

        let calldata = IEApps::getAppTokenBalancesCall {
            packedApplications: U256::from(Application::GrgStaking.flag()),
        }
        .abi_encode();
        let out = chain.call(ALICE, pool, &calldata).unwrap();
        let decoded = <Vec<AppTokenBalances> as SolValue>::abi_decode(&out).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].balances[0].token, GRG);
        assert_eq!(decoded[0].balances[0].amount, I256::try_from(1_000i64).unwrap());
    }
}
