//! Cross-chain message codec
//!
//! Typed views over the ABI wire structs in [`crate::abi`]. The envelope is
//! versioned; version 1 is the only layout understood here.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::abi;
use crate::errors::PoolError;

pub const MESSAGE_VERSION: u8 = 1;

/// Operation carried by a bridge message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpType {
    /// Move value between chains of the same pool, NAV-neutral on both sides
    Transfer = 0,
    /// Move value and align the destination NAV with the source NAV
    Sync = 1,
    /// Wire placeholder, rejected by every handler
    Unknown = 2,
}

impl TryFrom<u8> for OpType {
    type Error = PoolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpType::Transfer),
            1 => Ok(OpType::Sync),
            2 => Ok(OpType::Unknown),
            other => Err(PoolError::InvalidOpType(other)),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Transfer => write!(f, "Transfer"),
            OpType::Sync => write!(f, "Sync"),
            OpType::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================
// DESTINATION PARAMS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationParams {
    pub op_type: OpType,
    pub should_unwrap_native: bool,
}

impl DestinationParams {
    pub fn encode(&self) -> Bytes {
        abi::DestinationMessageParams::from(*self).abi_encode().into()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PoolError> {
        let raw = <abi::DestinationMessageParams as SolValue>::abi_decode(data)
            .map_err(|e| PoolError::MessageDecoding(e.to_string()))?;
        raw.try_into()
    }
}

impl From<DestinationParams> for abi::DestinationMessageParams {
    fn from(value: DestinationParams) -> Self {
        abi::DestinationMessageParams {
            opType: value.op_type as u8,
            shouldUnwrapNative: value.should_unwrap_native,
        }
    }
}

impl TryFrom<abi::DestinationMessageParams> for DestinationParams {
    type Error = PoolError;

    fn try_from(value: abi::DestinationMessageParams) -> Result<Self, Self::Error> {
        Ok(Self {
            op_type: OpType::try_from(value.opType)?,
            should_unwrap_native: value.shouldUnwrapNative,
        })
    }
}

// ============================================
// ENVELOPE
// ============================================

/// Decoded bridge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub params: DestinationParams,
    pub source_chain_id: U256,
    /// Unitary value on the source chain at deposit time
    pub source_nav: U256,
    pub source_decimals: u8,
    /// Allowed NAV deviation in basis points (Sync only)
    pub nav_tolerance: U256,
}

impl Message {
    pub fn encode(&self) -> Bytes {
        abi::CrosschainMessage {
            version: MESSAGE_VERSION,
            params: self.params.into(),
            sourceChainId: self.source_chain_id,
            sourceNav: self.source_nav,
            sourceDecimals: self.source_decimals,
            navTolerance: self.nav_tolerance,
        }
        .abi_encode()
        .into()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PoolError> {
        let raw = <abi::CrosschainMessage as SolValue>::abi_decode(data)
            .map_err(|e| PoolError::MessageDecoding(e.to_string()))?;
        if raw.version != MESSAGE_VERSION {
            return Err(PoolError::UnsupportedMessageVersion(raw.version));
        }
        Ok(Self {
            params: raw.params.try_into()?,
            source_chain_id: raw.sourceChainId,
            source_nav: raw.sourceNav,
            source_decimals: raw.sourceDecimals,
            nav_tolerance: raw.navTolerance,
        })
    }
}

// ============================================
// SOURCE PARAMS
// ============================================

/// What the pool owner asks for when bridging out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceParams {
    pub op_type: OpType,
    pub nav_tolerance: U256,
    /// Native amount to wrap before depositing
    pub source_native_amount: U256,
    pub should_unwrap_on_destination: bool,
}

impl From<SourceParams> for abi::SourceMessageParams {
    fn from(value: SourceParams) -> Self {
        abi::SourceMessageParams {
            opType: value.op_type as u8,
            navTolerance: value.nav_tolerance,
            sourceNativeAmount: value.source_native_amount,
            shouldUnwrapOnDestination: value.should_unwrap_on_destination,
        }
    }
}

impl TryFrom<abi::SourceMessageParams> for SourceParams {
    type Error = PoolError;

    fn try_from(value: abi::SourceMessageParams) -> Result<Self, Self::Error> {
        Ok(Self {
            op_type: OpType::try_from(value.opType)?,
            nav_tolerance: value.navTolerance,
            source_native_amount: value.sourceNativeAmount,
            should_unwrap_on_destination: value.shouldUnwrapOnDestination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_params_round_trip_every_op_type() {
        for op_type in [OpType::Transfer, OpType::Sync, OpType::Unknown] {
            for should_unwrap_native in [false, true] {
                let params = DestinationParams {
                    op_type,
                    should_unwrap_native,
                };
                assert_eq!(DestinationParams::decode(&params.encode()).unwrap(), params);
            }
        }
    }

    #[test]
    fn test_out_of_range_op_type_rejected() {
        let raw = abi::DestinationMessageParams {
            opType: 3,
            shouldUnwrapNative: false,
        };
        let err = DestinationParams::decode(&raw.abi_encode()).unwrap_err();
        assert_eq!(err, PoolError::InvalidOpType(3));
    }

    #[test]
    fn test_envelope_round_trip_and_version() {
        let message = Message {
            params: DestinationParams {
                op_type: OpType::Sync,
                should_unwrap_native: true,
            },
            source_chain_id: U256::from(1),
            source_nav: U256::from(1_050_000u64),
            source_decimals: 6,
            nav_tolerance: U256::from(100),
        };
        let encoded = message.encode();
        assert_eq!(Message::decode(&encoded).unwrap(), message);

        let mut raw = <abi::CrosschainMessage as SolValue>::abi_decode(&encoded).unwrap();
        raw.version = 2;
        assert_eq!(
            Message::decode(&raw.abi_encode()).unwrap_err(),
            PoolError::UnsupportedMessageVersion(2)
        );
    }

    #[test]
    fn test_garbage_is_a_decoding_error() {
        let err = Message::decode(&[0xde, 0xad]).unwrap_err();
        assert!(matches!(err, PoolError::MessageDecoding(_)));
    }
}
