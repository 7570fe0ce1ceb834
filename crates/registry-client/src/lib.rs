//! HTTP client for the external device registry the sync worker pushes
//! `PB` records into (spec §4.6).
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod outcome;
pub mod types;

pub use client::{RegistryClient, RegistryPush};
pub use error::RegistryClientError;
pub use outcome::{RegistryOutcome, RejectedStatus};
pub use types::RegistryRecord;
