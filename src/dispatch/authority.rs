//! Governance-controlled adapter registry
//!
//! Governance whitelists adapter contracts and maps selectors to them. Pools
//! consult the registry for any selector the extension map does not know.

use alloy_primitives::{Address, Selector};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::errors::PoolError;

/// Selector -> adapter lookup used by the fallback dispatcher.
pub trait AdapterRegistry {
    fn get_application_adapter(&self, selector: Selector) -> Option<Address>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    governance: Address,
    adapters: HashMap<Selector, Address>,
    whitelisted: HashSet<Address>,
}

impl Authority {
    pub fn new(governance: Address) -> Self {
        Self {
            governance,
            adapters: HashMap::new(),
            whitelisted: HashSet::new(),
        }
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    fn only_governance(&self, caller: Address) -> Result<(), PoolError> {
        if caller != self.governance {
            return Err(PoolError::NotAuthorized(caller));
        }
        Ok(())
    }

    /// Whitelist or de-list an adapter. De-listing drops its selectors.
    pub fn set_adapter(&mut self, caller: Address, adapter: Address, whitelisted: bool) -> Result<(), PoolError> {
        self.only_governance(caller)?;
        if whitelisted {
            self.whitelisted.insert(adapter);
        } else {
            self.whitelisted.remove(&adapter);
            self.adapters.retain(|_, target| *target != adapter);
        }
        info!(adapter = ?adapter, whitelisted, "adapter status changed");
        Ok(())
    }

    /// Route `selector` to a whitelisted adapter.
    pub fn add_method(&mut self, caller: Address, selector: Selector, adapter: Address) -> Result<(), PoolError> {
        self.only_governance(caller)?;
        if !self.whitelisted.contains(&adapter) {
            return Err(PoolError::AdapterNotWhitelisted(adapter));
        }
        self.adapters.insert(selector, adapter);
        info!(selector = %selector, adapter = ?adapter, "adapter method added");
        Ok(())
    }

    pub fn remove_method(&mut self, caller: Address, selector: Selector) -> Result<(), PoolError> {
        self.only_governance(caller)?;
        self.adapters.remove(&selector);
        Ok(())
    }

    pub fn is_whitelisted(&self, adapter: &Address) -> bool {
        self.whitelisted.contains(adapter)
    }
}

impl AdapterRegistry for Authority {
    fn get_application_adapter(&self, selector: Selector) -> Option<Address> {
        self.adapters.get(&selector).copied()
    }
}
