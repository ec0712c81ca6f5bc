//! Fixed selector -> extension map
//!
//! Extensions are deployed once per chain and shared by every pool. The map
//! is immutable after deployment: upgrading an extension means deploying a
//! new implementation with a new map.

use alloy_primitives::{keccak256, Address, Selector};
use alloy_sol_types::SolCall;
use std::collections::HashMap;

use crate::abi::{IEAcrossHandler, IEApps, IECrosschain, IENavView, IEOracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub target: Address,
    /// Run with write access to pool storage; otherwise read-only
    pub should_delegate: bool,
}

/// Resolves a selector to the extension that implements it.
pub trait ExtensionResolver {
    fn get_extension_by_selector(&self, selector: Selector) -> Option<ExtensionEntry>;
}

/// Addresses of the deployed extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionAddresses {
    pub crosschain: Address,
    pub across_handler: Address,
    pub apps: Address,
    pub nav_view: Address,
    pub oracle: Address,
}

impl ExtensionAddresses {
    /// Deterministic per-name addresses, identical on every chain.
    pub fn deterministic() -> Self {
        Self {
            crosschain: code_address("ECrosschain"),
            across_handler: code_address("EAcrossHandler"),
            apps: code_address("EApps"),
            nav_view: code_address("ENavView"),
            oracle: code_address("EOracle"),
        }
    }
}

/// Address a named contract is deployed at.
pub fn code_address(name: &str) -> Address {
    Address::from_word(keccak256(format!("smartpool.{}", name)))
}

#[derive(Debug, Clone)]
pub struct ExtensionsMap {
    addresses: ExtensionAddresses,
    entries: HashMap<Selector, ExtensionEntry>,
}

impl ExtensionsMap {
    pub fn new(addresses: ExtensionAddresses) -> Self {
        let routes: [([u8; 4], Address, bool); 6] = [
            (IECrosschain::donateCall::SELECTOR, addresses.crosschain, true),
            (
                IEAcrossHandler::handleV3AcrossMessageCall::SELECTOR,
                addresses.across_handler,
                true,
            ),
            (IEApps::getAppTokenBalancesCall::SELECTOR, addresses.apps, true),
            (IENavView::getNavDataViewCall::SELECTOR, addresses.nav_view, false),
            (IEOracle::hasPriceFeedCall::SELECTOR, addresses.oracle, false),
            (IEOracle::convertTokenAmountCall::SELECTOR, addresses.oracle, false),
        ];

        let entries = routes
            .into_iter()
            .map(|(selector, target, should_delegate)| {
                (
                    Selector::from(selector),
                    ExtensionEntry {
                        target,
                        should_delegate,
                    },
                )
            })
            .collect();

        Self { addresses, entries }
    }

    pub fn addresses(&self) -> &ExtensionAddresses {
        &self.addresses
    }
}

impl ExtensionResolver for ExtensionsMap {
    fn get_extension_by_selector(&self, selector: Selector) -> Option<ExtensionEntry> {
        self.entries.get(&selector).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_routes() {
        let addresses = ExtensionAddresses::deterministic();
        let map = ExtensionsMap::new(addresses);

        let donate = map
            .get_extension_by_selector(IECrosschain::donateCall::SELECTOR.into())
            .unwrap();
        assert_eq!(donate.target, addresses.crosschain);
        assert!(donate.should_delegate);

        let view = map
            .get_extension_by_selector(IENavView::getNavDataViewCall::SELECTOR.into())
            .unwrap();
        assert_eq!(view.target, addresses.nav_view);
        assert!(!view.should_delegate);

        assert!(map.get_extension_by_selector(Selector::ZERO).is_none());
    }

    #[test]
    fn test_addresses_are_distinct() {
        let a = ExtensionAddresses::deterministic();
        let all = [a.crosschain, a.across_handler, a.apps, a.nav_view, a.oracle];
        for (i, x) in all.iter().enumerate() {
            for y in &all[i + 1..] {
                assert_ne!(x, y);
            }
        }
    }
}
