//! SPM service logic: the HSM-mediated cryptographic engine.
//!
//! [`service::SpmService`] implements the generated `Spm` tonic trait over
//! any [`otprov_pkcs11_adapter::HsmBackend`]; the other modules are its
//! supporting building blocks, each independently testable against
//! [`otprov_pkcs11_adapter::SoftHsm`].
#![warn(missing_docs)]

pub mod cert;
pub mod error;
pub mod lifecycle_hash;
pub mod service;
pub mod was;

pub use service::{SpmService, CRYPTO_METHODS};
