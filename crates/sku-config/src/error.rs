//! Errors surfaced while loading or initializing SKU configuration.

use otprov_core::error::ProvisioningError;
use thiserror::Error;

/// Failure modes specific to this crate, converted into [`ProvisioningError`]
/// at the SPM service boundary.
#[derive(Debug, Error)]
pub enum SkuConfigError {
    #[error("reading SKU config directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing SKU config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown SKU: {0}")]
    UnknownSku(String),
    #[error("HSM initialization failed for SKU {sku}: {message}")]
    Init { sku: String, message: String },
}

impl From<SkuConfigError> for ProvisioningError {
    fn from(err: SkuConfigError) -> Self {
        match err {
            SkuConfigError::UnknownSku(sku) => ProvisioningError::not_found(format!("unknown SKU: {sku}")),
            other => ProvisioningError::internal(other.to_string()),
        }
    }
}
