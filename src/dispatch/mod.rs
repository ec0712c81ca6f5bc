//! Fallback routing for selectors a pool does not implement natively

pub mod authority;
pub mod extensions;
pub mod fallback;
pub mod version;

pub use authority::{AdapterRegistry, Authority};
pub use extensions::{ExtensionResolver, ExtensionsMap};
pub use fallback::{fallback, ExecutionMode, Target};
