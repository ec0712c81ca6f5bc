use alloy_primitives::Bytes;
use alloy_sol_types::{SolInterface, SolValue};

use super::bad_calldata;
use crate::abi::IEOracle::IEOracleCalls;
use crate::dispatch::fallback::{CallFrame, StaticFrame, Target};
use crate::errors::Revert;
use crate::oracle::Oracle;

/// `hasPriceFeed(token)` / `convertTokenAmount(token, amount, target)`
pub struct EOracle;

impl EOracle {
    fn query(oracle: &dyn Oracle, calldata: &[u8]) -> Result<Bytes, Revert> {
        let out = match IEOracleCalls::abi_decode(calldata).map_err(bad_calldata)? {
            IEOracleCalls::hasPriceFeed(c) => oracle.has_price_feed(c.token).abi_encode(),
            IEOracleCalls::convertTokenAmount(c) => oracle
                .convert_token_amount(c.token, c.amount, c.targetToken)?
                .abi_encode(),
        };
        Ok(out.into())
    }
}

impl Target for EOracle {
    fn name(&self) -> &'static str {
        "EOracle"
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::query(frame.tx.env.oracle.as_ref(), calldata)
    }

    fn invoke_readonly(&self, frame: &StaticFrame<'_>, calldata: &[u8]) -> Result<Bytes, Revert> {
        Self::query(frame.env.oracle.as_ref(), calldata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::IEOracle;
    use crate::oracle::MISSING_PRICE_FEED;
    use crate::testutil::*;
    use alloy_primitives::{Address, I256};
    use alloy_sol_types::SolCall;

    #[test]
    fn test_queries_through_pool() {
        let (mut chain, pool) = usdc_pool_chain();

        let calldata = IEOracle::hasPriceFeedCall { token: DAI }.abi_encode();
        let out = chain.call(ALICE, pool, &calldata).unwrap();
        assert!(<bool as SolValue>::abi_decode(&out).unwrap());

        let calldata = IEOracle::convertTokenAmountCall {
            token: Address::ZERO,
            amount: I256::try_from(1_000_000_000_000_000_000i64).unwrap(),
            targetToken: USDC,
        }
        .abi_encode();
        let out = chain.call(ALICE, pool, &calldata).unwrap();
        assert_eq!(
            <I256 as SolValue>::abi_decode(&out).unwrap(),
            I256::try_from(2_000_000_000i64).unwrap()
        );
    }

    #[test]
    fn test_oracle_revert_reaches_caller_verbatim() {
        let (mut chain, pool) = usdc_pool_chain();
        let calldata = IEOracle::convertTokenAmountCall {
            token: Address::repeat_byte(0x99),
            amount: I256::ONE,
            targetToken: USDC,
        }
        .abi_encode();
        let err = chain.call(ALICE, pool, &calldata).unwrap_err();
        assert_eq!(err.reason(), MISSING_PRICE_FEED);
    }
}
