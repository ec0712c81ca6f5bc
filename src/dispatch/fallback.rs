//! Fallback dispatcher
//!
//! Any selector a pool does not implement natively lands here.
//!
//! RESOLUTION ORDER:
//! 1. Extension map (fixed per deployment): mutating iff the entry says so.
//! 2. Authority adapter registry: mutating iff the caller owns the pool,
//!    read-only for everyone else.
//! 3. Nothing found: `PoolMethodNotAllowed`.
//!
//! Calldata is forwarded untouched and revert data comes back untouched.

use alloy_primitives::{Address, Bytes, Selector};
use tracing::debug;

use crate::chain::{Environment, Tx, WorldState};
use crate::dispatch::authority::AdapterRegistry;
use crate::dispatch::extensions::ExtensionResolver;
use crate::dispatch::version::is_version_higher_or_equal;
use crate::errors::{PoolError, Revert};

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Extension { target: Address, should_delegate: bool },
    Adapter { target: Address },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Runs against the pool's own storage; writes persist
    Delegate,
    /// Runs against an immutable view; writes are impossible
    Static,
}

/// Mutable execution context handed to a target.
pub struct CallFrame<'t, 'a> {
    pub tx: &'t mut Tx<'a>,
    pub pool: Address,
    pub caller: Address,
}

/// Read-only execution context handed to a target.
pub struct StaticFrame<'a> {
    pub env: &'a Environment,
    pub state: &'a WorldState,
    pub pool: Address,
    pub caller: Address,
}

/// Code deployed at an extension or adapter address.
pub trait Target: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum pool version this code runs on. `None` means the target does
    /// not implement the query, which counts as compatible.
    fn required_version(&self) -> Option<String> {
        None
    }

    fn invoke_mutating(&self, frame: &mut CallFrame<'_, '_>, calldata: &[u8]) -> Result<Bytes, Revert>;

    fn invoke_readonly(&self, _frame: &StaticFrame<'_>, _calldata: &[u8]) -> Result<Bytes, Revert> {
        Err(PoolError::StaticCallViolation.into_revert())
    }
}

// ============================================
// DISPATCH
// ============================================

/// First four bytes of `calldata`, zero-padded when shorter.
pub fn selector_of(calldata: &[u8]) -> Selector {
    let mut selector = [0u8; 4];
    let len = calldata.len().min(4);
    selector[..len].copy_from_slice(&calldata[..len]);
    Selector::from(selector)
}

pub fn resolve(
    extensions: &dyn ExtensionResolver,
    registry: &dyn AdapterRegistry,
    selector: Selector,
) -> Result<Resolution, PoolError> {
    if let Some(entry) = extensions.get_extension_by_selector(selector) {
        return Ok(Resolution::Extension {
            target: entry.target,
            should_delegate: entry.should_delegate,
        });
    }
    registry
        .get_application_adapter(selector)
        .map(|target| Resolution::Adapter { target })
        .ok_or(PoolError::MethodNotAllowed(selector))
}

/// Route a non-native call on `pool` to its extension or adapter.
pub fn fallback(
    tx: &mut Tx<'_>,
    pool: Address,
    caller: Address,
    calldata: &[u8],
) -> Result<Bytes, PoolError> {
    let env = tx.env;
    if pool == env.implementation {
        return Err(PoolError::ImplementationDirectCall);
    }

    let selector = selector_of(calldata);
    let resolution = resolve(&env.extensions, &tx.state.authority, selector)?;

    let (target, mode) = match resolution {
        Resolution::Extension {
            target,
            should_delegate,
        } => {
            let mode = if should_delegate {
                ExecutionMode::Delegate
            } else {
                ExecutionMode::Static
            };
            (target, mode)
        }
        Resolution::Adapter { target } => {
            let code = env.code(target)?;
            if let Some(required) = code.required_version() {
                let current = &env.config.pool_version;
                if !is_version_higher_or_equal(current, &required) {
                    return Err(PoolError::VersionMismatch {
                        required,
                        current: current.clone(),
                    });
                }
            }
            let owner = tx.pool(pool)?.owner();
            let mode = if caller == owner {
                ExecutionMode::Delegate
            } else {
                ExecutionMode::Static
            };
            (target, mode)
        }
    };

    let code = env.code(target)?;
    debug!(
        pool = ?pool,
        selector = %selector,
        target = code.name(),
        mode = ?mode,
        "fallback dispatch"
    );

    let result = match mode {
        ExecutionMode::Delegate => {
            let mut frame = CallFrame { tx, pool, caller };
            code.invoke_mutating(&mut frame, calldata)
        }
        ExecutionMode::Static => {
            let frame = StaticFrame {
                env,
                state: &*tx.state,
                pool,
                caller,
            };
            code.invoke_readonly(&frame, calldata)
        }
    };
    result.map_err(PoolError::Reverted)
}
