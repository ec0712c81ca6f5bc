//! Pool error taxonomy and raw revert payloads
//!
//! Every failure that crosses a call boundary (oracle, application reader,
//! token balance read, extension/adapter target) travels as a [`Revert`]:
//! the raw ABI revert bytes the callee produced. [`PoolError::Reverted`]
//! carries them upward untouched so a caller several hops away still sees
//! the original reason.

use alloy_primitives::{Address, Bytes, Selector, U256};
use alloy_sol_types::SolError;
use std::fmt;
use thiserror::Error;

/// Raw revert data returned by a failed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Revert(pub Bytes);

impl Revert {
    /// Encode a reason string as a standard `Error(string)` payload.
    pub fn from_reason(reason: impl Into<String>) -> Self {
        let payload = alloy_sol_types::Revert { reason: reason.into() };
        Self(payload.abi_encode().into())
    }

    /// Wrap raw revert bytes as produced by the callee.
    pub fn from_raw(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Decoded human-readable reason, if the payload carries one.
    pub fn reason(&self) -> Option<String> {
        alloy_sol_types::Revert::abi_decode(&self.0)
            .ok()
            .map(|payload| payload.reason)
    }

    pub fn data(&self) -> &Bytes {
        &self.0
    }
}

impl fmt::Display for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}", reason),
            None if self.0.is_empty() => write!(f, "reverted without data"),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

/// Errors raised by pool, dispatcher and cross-chain operations.
///
/// Any error aborts the surrounding transaction and rolls back all of its
/// effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Revert data propagated verbatim from a nested call.
    #[error("{0}")]
    Reverted(Revert),

    // ========== Configuration ==========
    #[error("BaseTokenBalanceError")]
    BaseTokenBalance,
    #[error("BaseTokenPriceFeedError")]
    BaseTokenPriceFeed,
    #[error("TokenPriceFeedDoesNotExist({0})")]
    TokenPriceFeedDoesNotExist(Address),
    #[error("ActiveTokenSetFull")]
    ActiveTokenSetFull,
    #[error("PoolImplementationDirectCallNotAllowed")]
    ImplementationDirectCall,
    #[error("PoolMethodNotAllowed({0})")]
    MethodNotAllowed(Selector),
    #[error("AdapterVersionNotSupported(required {required}, pool {current})")]
    VersionMismatch { required: String, current: String },
    #[error("TargetHasNoCode({0})")]
    TargetHasNoCode(Address),
    #[error("AdapterNotWhitelisted({0})")]
    AdapterNotWhitelisted(Address),
    #[error("InvalidDecimals({0})")]
    InvalidDecimals(u8),
    #[error("PoolAlreadyExists({0})")]
    PoolAlreadyExists(Address),

    // ========== Integrity ==========
    #[error("UnitaryValueIsZero")]
    UnitaryValueIsZero,
    #[error("ArithmeticOverflow")]
    Overflow,
    #[error("StaticCallViolation")]
    StaticCallViolation,
    #[error("ReentrantCall")]
    ReentrantCall,

    // ========== Access ==========
    #[error("PoolCallerIsNotOwner")]
    CallerIsNotOwner,
    #[error("CallerNotAuthorized({0})")]
    NotAuthorized(Address),
    #[error("CallerIsNotSpokePool({0})")]
    CallerIsNotSpokePool(Address),

    // ========== Input ==========
    #[error("InvalidAmount")]
    InvalidAmount,
    #[error("InvalidToken")]
    InvalidToken,
    #[error("UnsupportedToken({0})")]
    UnsupportedToken(Address),
    #[error("InvalidOpType({0})")]
    InvalidOpType(u8),
    #[error("InvalidNavTolerance({0})")]
    InvalidNavTolerance(U256),
    #[error("NavToleranceExceeded(source {source_nav}, destination {destination_nav}, tolerance {tolerance_bps} bps)")]
    NavToleranceExceeded {
        source_nav: U256,
        destination_nav: U256,
        tolerance_bps: U256,
    },
    #[error("DonationNotInitialized({0})")]
    DonationNotInitialized(Address),
    #[error("DonationBalanceMismatch(expected {expected}, received {received})")]
    DonationBalanceMismatch { expected: U256, received: U256 },
    #[error("PoolAmountSmallerThanMinimum({0})")]
    AmountTooSmall(U256),
    #[error("PoolOutputAmountBelowMinimum(expected {expected}, actual {actual})")]
    AmountOutBelowMinimum { expected: U256, actual: U256 },
    #[error("NotEnoughBaseToken(available {available}, required {required})")]
    NotEnoughBaseToken { available: U256, required: U256 },
    #[error("InsufficientBalance(token {token}, holder {holder})")]
    InsufficientBalance { token: Address, holder: Address },
    #[error("PoolNotFound({0})")]
    PoolNotFound(Address),
    #[error("UnknownDeposit({0})")]
    UnknownDeposit(u32),
    #[error("DepositNotPending({0})")]
    DepositNotPending(u32),
    #[error("DepositNotExpired({0})")]
    DepositNotExpired(u32),
    #[error("DepositExpired({0})")]
    DepositExpired(u32),
    #[error("WrongDestinationChain(expected {expected}, actual {actual})")]
    WrongDestinationChain { expected: u64, actual: u64 },
    #[error("MessageDecodingFailed({0})")]
    MessageDecoding(String),
    #[error("UnsupportedMessageVersion({0})")]
    UnsupportedMessageVersion(u8),
}

impl PoolError {
    /// Revert payload for this error. Propagated reverts keep their bytes.
    pub fn into_revert(self) -> Revert {
        match self {
            PoolError::Reverted(revert) => revert,
            other => Revert::from_reason(other.to_string()),
        }
    }

    /// Reason string as a caller outside the pool would observe it.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl From<Revert> for PoolError {
    fn from(revert: Revert) -> Self {
        PoolError::Reverted(revert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip() {
        let revert = Revert::from_reason("OracleMissingPriceFeed");
        assert_eq!(revert.reason().as_deref(), Some("OracleMissingPriceFeed"));
        assert_eq!(revert.to_string(), "OracleMissingPriceFeed");
    }

    #[test]
    fn test_propagated_revert_keeps_bytes() {
        let raw = Revert::from_raw(vec![0xde, 0xad, 0xbe, 0xef]);
        let err = PoolError::from(raw.clone());
        assert_eq!(err.into_revert(), raw);
    }

    #[test]
    fn test_pool_error_encodes_reason() {
        let revert = PoolError::InvalidAmount.into_revert();
        assert_eq!(revert.reason().as_deref(), Some("InvalidAmount"));
        // crossing a second boundary does not re-encode
        let again = PoolError::Reverted(revert.clone()).into_revert();
        assert_eq!(again, revert);
    }
}
