//! Extensions: persistent pool functionality behind the fixed selector map.
//!
//! | Extension        | Selectors                               | Mode      |
//! |------------------|-----------------------------------------|-----------|
//! | `ECrosschain`    | `donate`                                | delegate  |
//! | `EAcrossHandler` | `handleV3AcrossMessage`                 | delegate  |
//! | `EApps`          | `getAppTokenBalances`                   | delegate  |
//! | `ENavView`       | `getNavDataView`                        | static    |
//! | `EOracle`        | `hasPriceFeed`, `convertTokenAmount`    | static    |

mod apps;
mod crosschain;
mod nav_view;
mod oracle;

pub use apps::EApps;
pub use crosschain::{EAcrossHandler, ECrosschain};
pub use nav_view::ENavView;
pub use oracle::EOracle;

use crate::errors::Revert;

/// Revert for calldata a target cannot decode.
pub(crate) fn bad_calldata(err: alloy_sol_types::Error) -> Revert {
    Revert::from_reason(format!("InvalidCalldata: {}", err))
}
