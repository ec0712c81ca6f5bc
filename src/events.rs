//! Pool events and the JSON-lines event journal
//!
//! Events are part of world state: a reverted transaction drops the events
//! it emitted along with every other effect.

use alloy_primitives::{Address, I256, U256};
use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::crosschain::codec::OpType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PoolEvent {
    PoolInitialized {
        pool: Address,
        owner: Address,
        base_token: Address,
        name: String,
        symbol: String,
    },
    NewNav {
        pool: Address,
        unitary_value: U256,
        total_supply: U256,
    },
    Mint {
        pool: Address,
        caller: Address,
        recipient: Address,
        amount_in: U256,
        minted: U256,
    },
    Burn {
        pool: Address,
        holder: Address,
        burned: U256,
        revenue: U256,
    },
    TokenActivated {
        pool: Address,
        token: Address,
    },
    TokenRemoved {
        pool: Address,
        token: Address,
    },
    VirtualBalanceUpdated {
        pool: Address,
        token: Address,
        delta: I256,
        balance: I256,
    },
    TokensDonated {
        pool: Address,
        token: Address,
        amount: U256,
        op_type: OpType,
    },
    CrosschainDeposit {
        pool: Address,
        deposit_id: u32,
        input_token: Address,
        input_amount: U256,
        destination_chain_id: u64,
        op_type: OpType,
        refund_address: Address,
    },
    CrosschainMessageReceived {
        pool: Address,
        token: Address,
        amount: U256,
        op_type: OpType,
        source_chain_id: U256,
    },
}

impl PoolEvent {
    pub fn pool(&self) -> Address {
        match self {
            PoolEvent::PoolInitialized { pool, .. }
            | PoolEvent::NewNav { pool, .. }
            | PoolEvent::Mint { pool, .. }
            | PoolEvent::Burn { pool, .. }
            | PoolEvent::TokenActivated { pool, .. }
            | PoolEvent::TokenRemoved { pool, .. }
            | PoolEvent::VirtualBalanceUpdated { pool, .. }
            | PoolEvent::TokensDonated { pool, .. }
            | PoolEvent::CrosschainDeposit { pool, .. }
            | PoolEvent::CrosschainMessageReceived { pool, .. } => *pool,
        }
    }
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub chain_id: u64,
    #[serde(flatten)]
    pub event: PoolEvent,
}

impl EventRecord {
    pub fn new(chain_id: u64, event: PoolEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            chain_id,
            event,
        }
    }

    /// Append this record to a JSON-lines file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}
