//! The durable record shape (spec §4.5; wire `otprov.pb.Record`).

use crate::error::StoreError;
use otprov_core::DeviceId;

/// One device's registration record, as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Canonical hex `DeviceId` (spec §3); the store's primary key.
    pub device_id: String,
    pub sku: String,
    pub payload: Vec<u8>,
    pub auth_pubkey: Vec<u8>,
    pub auth_signature: Vec<u8>,
}

impl Record {
    /// Validate this record against `RegisterDevice`'s structural
    /// requirements: non-empty `device_id`/`sku`/`payload`, and a
    /// well-formed hex `device_id` (spec §4.5).
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.device_id.is_empty() {
            return Err(StoreError::InvalidRecord("device_id must not be empty".into()));
        }
        if self.sku.is_empty() {
            return Err(StoreError::InvalidRecord("sku must not be empty".into()));
        }
        if self.payload.is_empty() {
            return Err(StoreError::InvalidRecord("payload must not be empty".into()));
        }
        self.device_id
            .parse::<DeviceId>()
            .map_err(|e| StoreError::InvalidRecord(format!("malformed device_id: {e}")))?;
        Ok(())
    }
}

/// A [`Record`] as returned from storage, with its store-assigned metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: Record,
    /// Monotonically increasing per-`device_id` version; bumped on every
    /// insert for the same key (spec §4.5: "overwrites with an incremented
    /// version").
    pub version: u64,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
    /// Whether this record has been accepted by the external registry
    /// (spec §4.6 `mark_synced`).
    pub synced: bool,
}
