// Adapters layer: concrete implementations for external systems.

#[cfg(feature = "fetch")]
pub mod http;
pub mod storage;

pub use storage::LocalStorage;
