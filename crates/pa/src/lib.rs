//! The PA service: the session gateway ATE clients speak to, authorizing
//! every call and forwarding crypto and registration work to the SPM and
//! PB services (spec §4.4).
#![warn(missing_docs)]

pub mod authz;
pub mod service;

pub use service::{PaService, IDENTITY_KEY_LABEL};
