//! Tunables for the background synchronizer (spec §4.6 "Worker loop").

use std::time::Duration;

/// How the worker pulls records and talks to the registry between sleeps.
#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    /// How long to sleep after a tick that found nothing to sync.
    pub tick_interval: Duration,
    /// Max records fetched from the store in one tick (`N` in the spec).
    pub batch_size: usize,
    /// Submit the tick's records as one batch request rather than one
    /// request per record.
    pub batch_mode: bool,
    /// Bound on how many times a transport failure is retried within the
    /// same tick, before the remainder is left for the next tick (spec
    /// §4.6: "no exponential backoff is required, but a bounded retry
    /// count per tick is").
    pub max_retries_per_tick: usize,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_secs(5), batch_size: 100, batch_mode: true, max_retries_per_tick: 3 }
    }
}
