//! The PB RPC facade (spec §4.5): validates, inserts, and reports a
//! per-record status that is independent of the RPC's own transport status.

use std::sync::Arc;

use otprov_pb_store::{Record, RecordStore, StoreError};
use otprov_proto::pb::pb_server::Pb;
use otprov_proto::pb::{
    BatchRegisterDeviceRequest, BatchRegisterDeviceResponse, HealthzRequest, HealthzResponse, RegisterDeviceRequest, RegisterDeviceResponse,
    RpcStatus,
};
use tonic::{Request, Response, Status};

/// The write-ahead registration buffer, reachable only from the PA's
/// registry shim. Holds the store behind an `Arc` since the sync worker
/// (spec §4.6) shares the same store to drain it in the background.
pub struct PbService {
    store: Arc<RecordStore>,
}

impl PbService {
    /// Wrap an already-open [`RecordStore`] exclusively owned by this
    /// service (no background synchronizer sharing it, e.g. in tests).
    pub fn new(store: RecordStore) -> Self {
        Self { store: Arc::new(store) }
    }

    /// Wrap a [`RecordStore`] shared with a background synchronizer.
    pub fn new_shared(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Validate and insert one wire [`otprov_proto::pb::Record`], producing
    /// the per-record status spec §4.5 describes: `OK` on success,
    /// `INVALID_ARGUMENT` when validation fails (nothing is inserted),
    /// `INTERNAL` when the insert itself fails.
    fn register_one(&self, wire: otprov_proto::pb::Record) -> RegisterDeviceResponse {
        let record = Record {
            device_id: wire.device_id,
            sku: wire.sku,
            payload: wire.payload,
            auth_pubkey: wire.auth_pubkey,
            auth_signature: wire.auth_signature,
        };

        match self.store.insert(&record) {
            Ok(()) => RegisterDeviceResponse { status: RpcStatus::Ok as i32, error_detail: String::new() },
            Err(StoreError::InvalidRecord(detail)) => RegisterDeviceResponse { status: RpcStatus::InvalidArgument as i32, error_detail: detail },
            Err(err @ StoreError::Sqlite(_)) => RegisterDeviceResponse { status: RpcStatus::Internal as i32, error_detail: err.to_string() },
        }
    }
}

#[tonic::async_trait]
impl Pb for PbService {
    async fn register_device(&self, request: Request<RegisterDeviceRequest>) -> Result<Response<RegisterDeviceResponse>, Status> {
        let req = request.into_inner();
        let record = req.record.ok_or_else(|| Status::invalid_argument("record is required"))?;
        Ok(Response::new(self.register_one(record)))
    }

    async fn batch_register_device(
        &self,
        request: Request<BatchRegisterDeviceRequest>,
    ) -> Result<Response<BatchRegisterDeviceResponse>, Status> {
        let req = request.into_inner();
        let responses = req.records.into_iter().map(|record| self.register_one(record)).collect();
        Ok(Response::new(BatchRegisterDeviceResponse { responses }))
    }

    async fn healthz(&self, _request: Request<HealthzRequest>) -> Result<Response<HealthzResponse>, Status> {
        Ok(Response::new(HealthzResponse { serving: true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otprov_proto::pb::Record as WireRecord;

    fn wire(device_id: &str) -> WireRecord {
        WireRecord {
            device_id: device_id.into(),
            sku: "sival".into(),
            payload: vec![1, 2, 3],
            auth_pubkey: vec![4, 5, 6],
            auth_signature: vec![7, 8, 9],
        }
    }

    #[tokio::test]
    async fn register_device_succeeds_for_well_formed_record() {
        let service = PbService::new(RecordStore::open_in_memory().unwrap());
        let resp = service
            .register_device(Request::new(RegisterDeviceRequest { record: Some(wire("0x0001000200000000000000030000000400000000")) }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.status, RpcStatus::Ok as i32);
    }

    #[tokio::test]
    async fn register_device_rejects_empty_device_id_and_inserts_nothing() {
        let service = PbService::new(RecordStore::open_in_memory().unwrap());
        let resp =
            service.register_device(Request::new(RegisterDeviceRequest { record: Some(wire("")) })).await.unwrap().into_inner();
        assert_eq!(resp.status, RpcStatus::InvalidArgument as i32);
        assert!(service.store.last("").unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_register_device_always_succeeds_with_per_record_status() {
        let service = PbService::new(RecordStore::open_in_memory().unwrap());
        let resp = service
            .batch_register_device(Request::new(BatchRegisterDeviceRequest {
                records: vec![wire("0x0001000200000000000000030000000400000000"), wire("")],
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.responses.len(), 2);
        assert_eq!(resp.responses[0].status, RpcStatus::Ok as i32);
        assert_eq!(resp.responses[1].status, RpcStatus::InvalidArgument as i32);
    }
}
