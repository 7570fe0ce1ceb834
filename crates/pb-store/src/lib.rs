//! The Proxy Buffer's durable record store (spec §4.5): one sqlite table
//! keyed by `device_id`, with the `fetch_unsynced`/`mark_synced` surface
//! the sync worker polls.
#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use record::{Record, StoredRecord};
pub use store::RecordStore;
