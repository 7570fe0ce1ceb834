//! Per-SKU configuration model, file-backed loader, and one-time HSM
//! initialization (spec §4.2).
#![warn(missing_docs)]

pub mod error;
pub mod init;
pub mod loader;
pub mod types;

pub use error::SkuConfigError;
pub use init::ensure_sku_keys;
pub use loader::SkuRegistry;
pub use types::{CaDescriptor, LifecycleHashAlgorithm, LifecycleHashParams, SkuConfig, TokenSeedConfig, WrappingPolicy};
