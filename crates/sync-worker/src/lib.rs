//! Background synchronizer that drains the Proxy Buffer's durable store
//! into the external registry (spec §4.6).
#![warn(missing_docs)]

pub mod config;
pub mod worker;

pub use config::SyncWorkerConfig;
pub use worker::{SyncWorker, TickReport};
