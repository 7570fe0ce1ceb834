//! Capability-oriented PKCS#11 adapter (spec §4.1, §9).
//!
//! Exposes one [`backend::HsmBackend`] trait with two implementations:
//! [`software::SoftHsm`] (always available, used in dev/test) and
//! [`hardware::Pkcs11Hsm`] (behind the `hardware` feature, talks to a real
//! vendor module via `cryptoki`). Callers above this crate never see a
//! mechanism number or vendor attribute — only [`types`] values.
#![warn(missing_docs)]

pub mod backend;
pub mod pool;
pub mod software;
pub mod types;

#[cfg(feature = "hardware")]
pub mod hardware;

pub use backend::HsmBackend;
pub use pool::SessionPool;
pub use software::SoftHsm;
pub use types::*;

#[cfg(feature = "hardware")]
pub use hardware::Pkcs11Hsm;
