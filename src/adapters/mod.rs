//! Adapters: owner-driven pool functionality behind the authority registry.
//!
//! Unlike extensions, adapters are looked up per selector in the governance
//! [`Authority`] and only run with write access when the pool owner calls.
//! Each adapter may gate itself on a minimum pool version.

mod intents;
mod staking;

pub use intents::AIntents;
pub use staking::AStaking;

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use tracing::warn;

use crate::abi::{IAIntents, IAStaking};
use crate::dispatch::authority::Authority;
use crate::dispatch::extensions::code_address;

/// Addresses of the stock adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterAddresses {
    pub intents: Address,
    pub staking: Address,
}

impl AdapterAddresses {
    pub fn deterministic() -> Self {
        Self {
            intents: code_address("AIntents"),
            staking: code_address("AStaking"),
        }
    }

    /// Whitelist the stock adapters and route their selectors.
    pub fn bootstrap(&self, authority: &mut Authority, governance: Address) {
        let routes = [
            (self.intents, IAIntents::depositV3Call::SELECTOR),
            (self.staking, IAStaking::stakeCall::SELECTOR),
            (self.staking, IAStaking::undelegateStakeCall::SELECTOR),
        ];
        for (adapter, selector) in routes {
            let result = authority
                .set_adapter(governance, adapter, true)
                .and_then(|_| authority.add_method(governance, selector.into(), adapter));
            if let Err(err) = result {
                warn!(adapter = ?adapter, error = %err, "adapter bootstrap failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::authority::AdapterRegistry;

    #[test]
    fn test_bootstrap_routes_stock_selectors() {
        let governance = Address::repeat_byte(0x60);
        let addresses = AdapterAddresses::deterministic();
        let mut authority = Authority::new(governance);
        addresses.bootstrap(&mut authority, governance);

        assert!(authority.is_whitelisted(&addresses.intents));
        assert_eq!(
            authority.get_application_adapter(IAIntents::depositV3Call::SELECTOR.into()),
            Some(addresses.intents)
        );
        assert_eq!(
            authority.get_application_adapter(IAStaking::undelegateStakeCall::SELECTOR.into()),
            Some(addresses.staking)
        );
    }
}
