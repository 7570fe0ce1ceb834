//! The durable, sqlite-backed record store (spec §4.5).
//!
//! One table keyed by `device_id`. Concurrent writers serialize through a
//! single `Mutex`-protected connection; sqlite's own WAL mode lets readers
//! proceed without blocking on a writer, but since this process never opens
//! a second connection the mutex is the only serialization point that
//! matters here.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::record::{Record, StoredRecord};

/// The durable record store backing the Proxy Buffer.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (creating if absent) the sqlite database at `path`, enabling
    /// WAL mode and creating the `records` table if it doesn't exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// An in-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                device_id TEXT PRIMARY KEY,
                sku TEXT NOT NULL,
                payload BLOB NOT NULL,
                auth_pubkey BLOB NOT NULL,
                auth_signature BLOB NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                sync_state INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_records_sync_state ON records(sync_state)", [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Insert `record`, overwriting any prior row for the same `device_id`
    /// with an incremented version (spec §4.5: "after insert, `last(device_id)`
    /// returns the just-inserted record"). A re-registered device is marked
    /// unsynced again, since its payload may have changed.
    pub fn insert(&self, record: &Record) -> Result<(), StoreError> {
        record.validate()?;
        let now = now_unix();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO records (device_id, sku, payload, auth_pubkey, auth_signature, version, created_at, updated_at, sync_state)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, 0)
             ON CONFLICT(device_id) DO UPDATE SET
                sku = excluded.sku,
                payload = excluded.payload,
                auth_pubkey = excluded.auth_pubkey,
                auth_signature = excluded.auth_signature,
                version = records.version + 1,
                updated_at = excluded.updated_at,
                sync_state = 0",
            params![record.device_id, record.sku, record.payload, record.auth_pubkey, record.auth_signature, now],
        )?;
        tracing::debug!(device_id = %record.device_id, "record inserted");
        Ok(())
    }

    /// The current row for `device_id`, if any (spec §4.5 `last(device_id)`).
    pub fn last(&self, device_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT device_id, sku, payload, auth_pubkey, auth_signature, version, created_at, updated_at, sync_state
             FROM records WHERE device_id = ?1",
            params![device_id],
            row_to_stored_record,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Up to `limit` records not yet accepted by the external registry,
    /// oldest update first (spec §4.6 worker loop).
    pub fn fetch_unsynced(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT device_id, sku, payload, auth_pubkey, auth_signature, version, created_at, updated_at, sync_state
             FROM records WHERE sync_state = 0 ORDER BY updated_at ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_stored_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Mark every id in `device_ids` as synced, in one transaction (spec
    /// §4.5 "transactional bulk update").
    pub fn mark_synced(&self, device_ids: &[String]) -> Result<(), StoreError> {
        if device_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE records SET sync_state = 1 WHERE device_id = ?1")?;
            for id in device_ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = device_ids.len(), "records marked synced");
        Ok(())
    }
}

fn row_to_stored_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        record: Record {
            device_id: row.get(0)?,
            sku: row.get(1)?,
            payload: row.get(2)?,
            auth_pubkey: row.get(3)?,
            auth_signature: row.get(4)?,
        },
        version: row.get::<_, i64>(5)? as u64,
        created_at_unix: row.get(6)?,
        updated_at_unix: row.get(7)?,
        synced: row.get::<_, i64>(8)? != 0,
    })
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
