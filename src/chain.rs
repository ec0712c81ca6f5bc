//! In-process chain: world state, code registry and atomic transactions
//!
//! A [`Chain`] owns everything one network holds for the protocol: the token
//! ledger, pool storage, application positions, the adapter authority,
//! escrows and the bridge spoke pool. Every top-level operation runs through
//! [`Chain::transact`], which either commits all of its effects or none.
//!
//! TRANSACTION RULES:
//! - World state is snapshotted on entry and restored on any error
//! - Transient storage is cleared on entry and on exit, never in between
//! - Calls are serial; nested calls share the transaction's [`Tx`]

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::abi::IEscrow;
use crate::adapters::{AIntents, AStaking, AdapterAddresses};
use crate::crosschain::bridge::SpokePool;
use crate::crosschain::escrow::{self, Escrow};
use crate::dispatch::authority::Authority;
use crate::dispatch::extensions::{code_address, ExtensionAddresses, ExtensionsMap};
use crate::dispatch::fallback::Target;
use crate::errors::PoolError;
use crate::events::PoolEvent;
use crate::extensions::{EAcrossHandler, EApps, ECrosschain, ENavView, EOracle};
use crate::ledger::Ledger;
use crate::nav::applications::{ApplicationAggregator, ApplicationLedger};
use crate::nav::engine::{NavEngine, NavUpdate, NavUpdateKind};
use crate::oracle::Oracle;
use crate::pool::storage::{PoolParams, PoolStorage};
use crate::pool::SmartPool;
use crate::transient::TransientStorage;

// ============================================
// CONFIGURATION
// ============================================

/// Per-chain deployment parameters.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub wrapped_native: Address,
    /// Version string of the pool implementation, e.g. "4.1.0"
    pub pool_version: String,
    /// Bridge contract allowed to deliver cross-chain messages
    pub spoke_pool: Address,
    /// Tokens the bridge accepts
    pub crosschain_tokens: HashSet<Address>,
    /// Upper bound on a Sync message's NAV tolerance
    pub max_nav_tolerance_bps: u64,
    /// Seconds a bridge deposit stays fillable
    pub fill_window_secs: u32,
    pub governance: Address,
    pub grg_token: Address,
    pub staking_proxy: Address,
}

/// Factory all pools are deployed from.
pub fn pool_factory() -> Address {
    code_address("PoolFactory")
}

/// Implementation every pool proxy points at.
pub fn pool_implementation() -> Address {
    code_address("SmartPoolImplementation")
}

// ============================================
// ENVIRONMENT (code and immutables)
// ============================================

pub struct Environment {
    pub config: ChainConfig,
    pub oracle: Arc<dyn Oracle>,
    pub aggregator: ApplicationAggregator,
    pub extensions: ExtensionsMap,
    pub adapters: AdapterAddresses,
    pub implementation: Address,
    code: HashMap<Address, Arc<dyn Target>>,
}

impl Environment {
    /// Code deployed at `address`.
    pub fn code(&self, address: Address) -> Result<&Arc<dyn Target>, PoolError> {
        self.code
            .get(&address)
            .ok_or(PoolError::TargetHasNoCode(address))
    }
}

// ============================================
// WORLD STATE
// ============================================

#[derive(Debug, Clone)]
pub struct WorldState {
    pub ledger: Ledger,
    pub pools: HashMap<Address, PoolStorage>,
    pub applications: ApplicationLedger,
    pub authority: Authority,
    pub escrows: HashMap<Address, Escrow>,
    pub spoke_pool: SpokePool,
    pub events: Vec<PoolEvent>,
    /// Block timestamp in seconds
    pub timestamp: u64,
}

// ============================================
// TRANSACTION CONTEXT
// ============================================

/// Execution context of one transaction.
pub struct Tx<'a> {
    pub env: &'a Environment,
    pub state: &'a mut WorldState,
    pub transient: &'a mut TransientStorage,
    /// Account that signed the transaction
    pub origin: Address,
}

impl<'a> Tx<'a> {
    pub fn emit(&mut self, event: PoolEvent) {
        debug!(event = ?event, "event");
        self.state.events.push(event);
    }

    pub fn pool(&self, pool: Address) -> Result<&PoolStorage, PoolError> {
        self.state.pools.get(&pool).ok_or(PoolError::PoolNotFound(pool))
    }

    pub fn pool_mut(&mut self, pool: Address) -> Result<&mut PoolStorage, PoolError> {
        self.state
            .pools
            .get_mut(&pool)
            .ok_or(PoolError::PoolNotFound(pool))
    }

    /// Refresh the unitary value of `pool` using this transaction's scratch.
    pub fn update_nav(&mut self, pool: Address) -> Result<NavUpdate, PoolError> {
        let env = self.env;
        let state = &mut *self.state;
        let storage = state
            .pools
            .get_mut(&pool)
            .ok_or(PoolError::PoolNotFound(pool))?;
        let engine = NavEngine::new(
            pool,
            storage,
            &state.ledger,
            &state.applications,
            &env.aggregator,
            env.oracle.as_ref(),
            self.transient.scratch(pool),
        );
        let update = engine.update_unitary_value()?;

        for token in &update.activated {
            self.emit(PoolEvent::TokenActivated { pool, token: *token });
        }
        if update.kind != NavUpdateKind::Unchanged {
            self.emit(PoolEvent::NewNav {
                pool,
                unitary_value: update.unitary_value,
                total_supply: update.total_supply,
            });
        }
        Ok(update)
    }

    /// Add `token` to the active set of `pool`, emitting on insertion.
    pub fn activate_token(&mut self, pool: Address, token: Address) -> Result<(), PoolError> {
        let oracle = self.env.oracle.clone();
        let storage = self.pool_mut(pool)?;
        let base = storage.base_token();
        if storage.active_tokens.add_unique(oracle.as_ref(), token, base)? {
            self.emit(PoolEvent::TokenActivated { pool, token });
        }
        Ok(())
    }

    /// Message call from `caller` to `to`.
    pub fn call(&mut self, caller: Address, to: Address, calldata: &[u8]) -> Result<Bytes, PoolError> {
        if self.state.escrows.contains_key(&to) {
            return escrow::handle(self, caller, to, calldata);
        }
        if self.state.pools.contains_key(&to) {
            return SmartPool::new(self, to).handle(caller, calldata);
        }
        Err(PoolError::TargetHasNoCode(to))
    }
}

// ============================================
// CHAIN
// ============================================

pub struct Chain {
    env: Environment,
    state: WorldState,
    transient: TransientStorage,
}

impl Chain {
    /// Deploy the implementation, extensions, stock adapters and authority.
    pub fn new(config: ChainConfig, oracle: Arc<dyn Oracle>) -> Self {
        let extension_addresses = ExtensionAddresses::deterministic();
        let adapters = AdapterAddresses::deterministic();
        let implementation = pool_implementation();

        let mut code: HashMap<Address, Arc<dyn Target>> = HashMap::new();
        code.insert(extension_addresses.crosschain, Arc::new(ECrosschain));
        code.insert(extension_addresses.across_handler, Arc::new(EAcrossHandler));
        code.insert(extension_addresses.apps, Arc::new(EApps));
        code.insert(extension_addresses.nav_view, Arc::new(ENavView));
        code.insert(extension_addresses.oracle, Arc::new(EOracle));
        code.insert(adapters.intents, Arc::new(AIntents));
        code.insert(adapters.staking, Arc::new(AStaking));

        let mut authority = Authority::new(config.governance);
        adapters.bootstrap(&mut authority, config.governance);

        let mut pools = HashMap::new();
        // the bare implementation has storage of its own, owned by nobody
        pools.insert(
            implementation,
            PoolStorage::new(PoolParams {
                name: String::new(),
                symbol: String::new(),
                owner: Address::ZERO,
                base_token: Address::ZERO,
                decimals: 18,
            }),
        );

        let state = WorldState {
            ledger: Ledger::new(config.wrapped_native),
            pools,
            applications: ApplicationLedger::default(),
            authority,
            escrows: HashMap::new(),
            spoke_pool: SpokePool::new(config.spoke_pool),
            events: Vec::new(),
            timestamp: 1_700_000_000,
        };

        info!(chain_id = config.chain_id, version = %config.pool_version, "chain initialized");

        Self {
            env: Environment {
                config,
                oracle,
                aggregator: ApplicationAggregator::new(),
                extensions: ExtensionsMap::new(extension_addresses),
                adapters,
                implementation,
                code,
            },
            state,
            transient: TransientStorage::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn chain_id(&self) -> u64 {
        self.env.config.chain_id
    }

    /// Direct state access outside any transaction, for seeding balances.
    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    /// Put `target` at `address` (deployment outside a transaction).
    pub fn deploy_code(&mut self, address: Address, target: Arc<dyn Target>) {
        self.env.code.insert(address, target);
    }

    /// Swap the application aggregator (e.g. to plug in a custom reader).
    pub fn aggregator_mut(&mut self) -> &mut ApplicationAggregator {
        &mut self.env.aggregator
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.state.timestamp += secs;
    }

    pub fn pool(&self, pool: Address) -> Option<&PoolStorage> {
        self.state.pools.get(&pool)
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.state.ledger.raw_balance(token, holder)
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.state.events
    }

    /// Run `f` as one atomic transaction signed by `origin`.
    pub fn transact<T>(
        &mut self,
        origin: Address,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let snapshot = self.state.clone();
        self.transient.clear();

        let result = {
            let mut tx = Tx {
                env: &self.env,
                state: &mut self.state,
                transient: &mut self.transient,
                origin,
            };
            f(&mut tx)
        };

        self.transient.clear();
        if let Err(err) = &result {
            debug!(origin = ?origin, error = %err, "transaction reverted");
            self.state = snapshot;
        }
        result
    }

    // ========== Typed entry points ==========

    /// Deploy and initialize a pool owned by `params.owner`.
    pub fn deploy_pool(&mut self, params: PoolParams) -> Result<Address, PoolError> {
        let owner = params.owner;
        self.transact(owner, |tx| {
            params.validate()?;
            let mut salt_input = owner.to_vec();
            salt_input.extend_from_slice(params.name.as_bytes());
            let salt: B256 = keccak256(salt_input);
            let pool = pool_factory().create2(salt, keccak256(tx.env.implementation));

            if tx.state.pools.contains_key(&pool) {
                return Err(PoolError::PoolAlreadyExists(pool));
            }
            tx.emit(PoolEvent::PoolInitialized {
                pool,
                owner,
                base_token: params.base_token,
                name: params.name.clone(),
                symbol: params.symbol.clone(),
            });
            tx.state.pools.insert(pool, PoolStorage::new(params));
            info!(pool = ?pool, owner = ?owner, "pool deployed");
            Ok(pool)
        })
    }

    pub fn mint(
        &mut self,
        caller: Address,
        pool: Address,
        recipient: Address,
        amount_in: U256,
        amount_out_min: U256,
    ) -> Result<U256, PoolError> {
        self.transact(caller, |tx| {
            SmartPool::new(tx, pool).mint(caller, recipient, amount_in, amount_out_min)
        })
    }

    pub fn burn(
        &mut self,
        caller: Address,
        pool: Address,
        amount_in: U256,
        amount_out_min: U256,
    ) -> Result<U256, PoolError> {
        self.transact(caller, |tx| {
            SmartPool::new(tx, pool).burn(caller, amount_in, amount_out_min)
        })
    }

    pub fn update_unitary_value(&mut self, caller: Address, pool: Address) -> Result<NavUpdate, PoolError> {
        self.transact(caller, |tx| tx.update_nav(pool))
    }

    /// Raw message call, as an externally owned account would send it.
    pub fn call(&mut self, caller: Address, to: Address, calldata: &[u8]) -> Result<Bytes, PoolError> {
        self.transact(caller, |tx| tx.call(caller, to, calldata))
    }

    /// Permissionless escrow flush.
    pub fn refund_vault(&mut self, caller: Address, escrow: Address, token: Address) -> Result<(), PoolError> {
        let calldata = IEscrow::refundVaultCall { token }.abi_encode();
        self.call(caller, escrow, &calldata).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_failed_transaction_rolls_back_everything() {
        let (mut chain, pool) = usdc_pool_chain();
        let events_before = chain.events().len();

        let result: Result<(), PoolError> = chain.transact(OWNER, |tx| {
            tx.state.ledger.mint(USDC, ALICE, U256::from(5));
            tx.pool_mut(pool)?.mint_shares(ALICE, U256::from(5))?;
            tx.emit(PoolEvent::TokenActivated { pool, token: USDC });
            tx.transient.enter(pool)?;
            Err(PoolError::InvalidAmount)
        });

        assert_eq!(result, Err(PoolError::InvalidAmount));
        assert_eq!(chain.balance(USDC, ALICE), U256::ZERO);
        assert_eq!(chain.pool(pool).unwrap().balance_of(&ALICE), U256::ZERO);
        assert_eq!(chain.events().len(), events_before);
        // transient storage is clear for the next transaction
        chain.transact(OWNER, |tx| tx.transient.enter(pool)).unwrap();
    }

    #[test]
    fn test_pool_addresses_are_deterministic() {
        let (mut chain, pool) = usdc_pool_chain();
        let (_, other) = usdc_pool_chain();
        assert_eq!(pool, other);

        let err = chain.deploy_pool(usdc_pool_params()).unwrap_err();
        assert_eq!(err, PoolError::PoolAlreadyExists(pool));
    }

    #[test]
    fn test_call_to_unknown_address() {
        let (mut chain, _) = usdc_pool_chain();
        let nobody = Address::repeat_byte(0x42);
        assert_eq!(chain.call(ALICE, nobody, &[]), Err(PoolError::TargetHasNoCode(nobody)));
    }
}
