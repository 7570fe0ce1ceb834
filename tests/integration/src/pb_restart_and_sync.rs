//! Spec §8 concrete scenario 6: records written before a process restart
//! stay unsynced across the restart, and the background synchronizer then
//! drains them into the registry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use otprov_pb_store::{Record, RecordStore};
use otprov_registry_client::{RegistryOutcome, RegistryPush, RegistryRecord};
use otprov_sync_worker::{SyncWorker, SyncWorkerConfig};

struct AcceptingRegistry {
    calls: Mutex<usize>,
}

impl AcceptingRegistry {
    fn new() -> Self {
        Self { calls: Mutex::new(0) }
    }
}

#[async_trait::async_trait]
impl RegistryPush for AcceptingRegistry {
    async fn register_device(&self, record: &RegistryRecord) -> RegistryOutcome {
        self.batch_register_device(std::slice::from_ref(record)).await.into_iter().next().unwrap()
    }

    async fn batch_register_device(&self, records: &[RegistryRecord]) -> Vec<RegistryOutcome> {
        *self.calls.lock().unwrap() += 1;
        records.iter().map(|r| RegistryOutcome::Accepted { device_id: r.device_id.clone() }).collect()
    }
}

fn sample(device_id: &str) -> Record {
    Record { device_id: device_id.into(), sku: "sival".into(), payload: vec![9, 9, 9], auth_pubkey: vec![1], auth_signature: vec![2] }
}

fn config() -> SyncWorkerConfig {
    SyncWorkerConfig { tick_interval: Duration::from_millis(1), batch_size: 10, batch_mode: true, max_retries_per_tick: 2 }
}

#[tokio::test]
async fn unsynced_records_survive_a_restart_then_drain_on_the_next_tick() {
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("pb.sqlite3");
    let id_a = "0x0001000200000000000000030000000400000000";
    let id_b = "0x0005000600000000000000070000000800000000";

    {
        let store = RecordStore::open(&db_path).unwrap();
        store.insert(&sample(id_a)).unwrap();
        store.insert(&sample(id_b)).unwrap();
    }

    // "Restart": reopen the same sqlite file as a fresh `RecordStore`.
    let store = Arc::new(RecordStore::open(&db_path).unwrap());
    let unsynced = store.fetch_unsynced(10).unwrap();
    assert_eq!(unsynced.len(), 2);
    assert!(unsynced.iter().all(|r| !r.synced));

    let registry = AcceptingRegistry::new();
    let worker = SyncWorker::new(store.clone(), registry, config());
    let report = worker.tick().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.accepted, 2);
    assert!(store.fetch_unsynced(10).unwrap().is_empty());
    assert!(store.last(id_a).unwrap().unwrap().synced);
    assert!(store.last(id_b).unwrap().unwrap().synced);
}

#[tokio::test]
async fn a_record_inserted_after_the_first_sync_is_picked_up_on_the_next_tick() {
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("pb.sqlite3");
    let id_a = "0x0001000200000000000000030000000400000000";
    let id_b = "0x0005000600000000000000070000000800000000";

    let store = Arc::new(RecordStore::open(&db_path).unwrap());
    store.insert(&sample(id_a)).unwrap();

    let registry = AcceptingRegistry::new();
    let worker = SyncWorker::new(store.clone(), registry, config());
    let first = worker.tick().await.unwrap();
    assert_eq!(first.accepted, 1);

    store.insert(&sample(id_b)).unwrap();
    let second = worker.tick().await.unwrap();
    assert_eq!(second.fetched, 1);
    assert_eq!(second.accepted, 1);
    assert!(store.last(id_b).unwrap().unwrap().synced);
}
