//! The background task that drains [`otprov_pb_store::RecordStore`] into
//! the external registry (spec §4.6).

use std::sync::Arc;

use otprov_pb_store::{RecordStore, StoreError, StoredRecord};
use otprov_registry_client::{RegistryOutcome, RegistryPush, RegistryRecord};
use tracing::{debug, info, warn};

use crate::config::SyncWorkerConfig;

/// Tally of one tick, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records pulled from the store this tick.
    pub fetched: usize,
    /// Records the registry accepted and that were marked synced.
    pub accepted: usize,
    /// Records the registry deterministically rejected; left unsynced.
    pub rejected: usize,
    /// Records still unresolved after exhausting the per-tick retry
    /// budget; left unsynced, retried next tick.
    pub abandoned: usize,
}

/// Drains unsynced records from the store into the registry on a fixed
/// cadence.
pub struct SyncWorker<R: RegistryPush> {
    store: Arc<RecordStore>,
    registry: R,
    config: SyncWorkerConfig,
}

impl<R: RegistryPush> SyncWorker<R> {
    /// Build a worker over an already-open store and a registry client (or
    /// fake, in tests).
    pub fn new(store: Arc<RecordStore>, registry: R, config: SyncWorkerConfig) -> Self {
        Self { store, registry, config }
    }

    /// Run forever, ticking on `config.tick_interval` whenever a tick finds
    /// nothing to do.
    pub async fn run(&self) -> ! {
        loop {
            match self.tick().await {
                Ok(report) if report.fetched == 0 => {
                    tokio::time::sleep(self.config.tick_interval).await;
                }
                Ok(report) => {
                    info!(fetched = report.fetched, accepted = report.accepted, rejected = report.rejected, abandoned = report.abandoned, "sync tick complete");
                }
                Err(err) => {
                    warn!(error = %err, "sync tick failed to read from the store");
                    tokio::time::sleep(self.config.tick_interval).await;
                }
            }
        }
    }

    /// Pull up to `batch_size` unsynced records and push them to the
    /// registry, retrying transport failures up to `max_retries_per_tick`
    /// times before leaving the remainder for the next tick.
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        let stored = self.store.fetch_unsynced(self.config.batch_size)?;
        let fetched = stored.len();
        if stored.is_empty() {
            return Ok(TickReport::default());
        }

        let mut pending: Vec<RegistryRecord> = stored.iter().map(to_registry_record).collect();
        let mut accepted_ids = Vec::new();
        let mut rejected = 0usize;
        let mut abandoned = 0usize;

        for attempt in 0..=self.config.max_retries_per_tick {
            if pending.is_empty() {
                break;
            }
            let outcomes = self.push(&pending).await;
            let mut retry = Vec::new();
            for outcome in outcomes {
                match outcome {
                    RegistryOutcome::Accepted { device_id } => accepted_ids.push(device_id),
                    RegistryOutcome::Rejected { device_id, message, .. } => {
                        debug!(device_id = %device_id, reason = %message, "registry rejected record");
                        rejected += 1;
                    }
                    RegistryOutcome::Transport { device_id, message } => {
                        if attempt < self.config.max_retries_per_tick {
                            if let Some(record) = pending.iter().find(|r| r.device_id == device_id).cloned() {
                                retry.push(record);
                            }
                        } else {
                            warn!(device_id = %device_id, reason = %message, "sync retry budget exhausted for this tick");
                            abandoned += 1;
                        }
                    }
                }
            }
            pending = retry;
        }

        if !accepted_ids.is_empty() {
            self.store.mark_synced(&accepted_ids)?;
        }

        Ok(TickReport { fetched, accepted: accepted_ids.len(), rejected, abandoned })
    }

    async fn push(&self, records: &[RegistryRecord]) -> Vec<RegistryOutcome> {
        if self.config.batch_mode {
            self.registry.batch_register_device(records).await
        } else {
            let mut outcomes = Vec::with_capacity(records.len());
            for record in records {
                outcomes.push(self.registry.register_device(record).await);
            }
            outcomes
        }
    }
}

fn to_registry_record(stored: &StoredRecord) -> RegistryRecord {
    RegistryRecord {
        device_id: stored.record.device_id.clone(),
        sku: stored.record.sku.clone(),
        version: stored.version,
        data: stored.record.payload.clone(),
        auth_pubkey: stored.record.auth_pubkey.clone(),
        auth_signature: stored.record.auth_signature.clone(),
    }
}
