//! End-to-end session-gateway flow: real in-process gRPC servers for SPM,
//! PB, and PA, driven by a real generated `PaClient` (spec §8 scenarios 1
//! and 3, plus the §4.4 authorization invariants, now exercised over the
//! network rather than against bare service structs).

use std::sync::Arc;

use otprov_pa::PaService;
use otprov_pb::PbService;
use otprov_pb_store::RecordStore;
use otprov_proto::common::{DeviceData, DeviceLifeCycle, TokenSeed, TokenType};
use otprov_proto::pa::pa_client::PaClient;
use otprov_proto::pa::pa_server::PaServer;
use otprov_proto::pa::{CloseSessionRequest, InitSessionRequest, RegisterDeviceRequest, RpcStatus as PaRpcStatus};
use otprov_proto::pb::pb_client::PbClient;
use otprov_proto::pb::pb_server::PbServer;
use otprov_proto::spm::spm_client::SpmClient;
use otprov_proto::spm::spm_server::SpmServer;
use otprov_proto::spm::{DeriveTokensRequest, TokenParams};
use otprov_session_store::SessionStore;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Endpoint, Server};
use tonic::Request;

use crate::fixtures;

async fn start_spm(service: otprov_spm::SpmService<otprov_pkcs11_adapter::SoftHsm>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder().add_service(SpmServer::new(service)).serve_with_incoming(TcpListenerStream::new(listener)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_pb(service: PbService) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder().add_service(PbServer::new(service)).serve_with_incoming(TcpListenerStream::new(listener)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_pa(service: PaService) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder().add_service(PaServer::new(service)).serve_with_incoming(TcpListenerStream::new(listener)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn connect(addr: &str) -> Channel {
    Endpoint::from_shared(addr.to_string()).unwrap().connect().await.unwrap()
}

#[tokio::test]
async fn ate_client_drives_full_provisioning_flow_through_pa() {
    let harness = fixtures::spm_harness().await;
    let spm_addr = start_spm(harness.service).await;

    let store = Arc::new(RecordStore::open_in_memory().unwrap());
    let pb_addr = start_pb(PbService::new_shared(store.clone())).await;

    let spm_channel = connect(&spm_addr).await;
    let pb_channel = connect(&pb_addr).await;
    let pa_service = PaService::new(SessionStore::new(), SpmClient::new(spm_channel), PbClient::new(pb_channel), false);
    let pa_addr = start_pa(pa_service).await;

    let mut pa_client = PaClient::connect(pa_addr).await.unwrap();

    let mut init_request = Request::new(InitSessionRequest { sku: fixtures::SKU.into(), sku_auth: fixtures::SKU_AUTH_PASSWORD.into() });
    init_request.metadata_mut().insert("x-otprov-user-id", "ate-1".parse().unwrap());
    let session_token = pa_client.init_session(init_request).await.unwrap().into_inner().session_token;
    assert!(otprov_core::token::is_well_formed_session_token(&session_token));

    let mut derive_request = Request::new(DeriveTokensRequest {
        sku: fixtures::SKU.into(),
        params: vec![TokenParams {
            seed: TokenSeed::LowSecurity as i32,
            r#type: TokenType::Raw as i32,
            size_bits: 128,
            diversifier: "test_unlock".into(),
            wrap_seed: false,
        }],
    });
    derive_request.metadata_mut().insert("x-otprov-user-id", "ate-1".parse().unwrap());
    derive_request.metadata_mut().insert("authorization", session_token.parse().unwrap());
    let tokens = pa_client.derive_tokens(derive_request).await.unwrap().into_inner().tokens;
    assert_eq!(tokens[0].raw.len(), 16);

    let unauthorized = Request::new(DeriveTokensRequest { sku: fixtures::SKU.into(), params: vec![] });
    let err = pa_client.derive_tokens(unauthorized).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);

    let device_id =
        otprov_core::DeviceId::new(fixtures::SILICON_CREATOR_ID, fixtures::PRODUCT_ID, 0xdead_beef_0000_0002, 0, vec![]).unwrap().to_string();
    let device_data = DeviceData {
        device_id: device_id.clone(),
        sku: fixtures::SKU.into(),
        device_life_cycle: DeviceLifeCycle::Prod as i32,
        wrapped_rma_unlock_token: vec![],
        perso_tlv_payload: vec![],
        metadata: vec![],
    };
    let mut register_request = Request::new(RegisterDeviceRequest { device_data: Some(device_data) });
    register_request.metadata_mut().insert("x-otprov-user-id", "ate-1".parse().unwrap());
    register_request.metadata_mut().insert("authorization", session_token.parse().unwrap());
    let response = pa_client.register_device(register_request).await.unwrap().into_inner();
    assert_eq!(response.status, PaRpcStatus::Ok as i32);

    let stored = store.last(&device_id).unwrap().unwrap();
    assert!(!stored.synced);
    assert_eq!(stored.record.sku, fixtures::SKU);
    assert!(!stored.record.auth_signature.is_empty());

    store.mark_synced(&[device_id.clone()]).unwrap();
    assert!(store.fetch_unsynced(10).unwrap().is_empty());

    let mut close_request = Request::new(CloseSessionRequest {});
    close_request.metadata_mut().insert("x-otprov-user-id", "ate-1".parse().unwrap());
    pa_client.close_session(close_request).await.unwrap();

    let mut post_close_request = Request::new(DeriveTokensRequest { sku: fixtures::SKU.into(), params: vec![] });
    post_close_request.metadata_mut().insert("x-otprov-user-id", "ate-1".parse().unwrap());
    post_close_request.metadata_mut().insert("authorization", session_token.parse().unwrap());
    let err = pa_client.derive_tokens(post_close_request).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn register_device_with_unparseable_device_id_fails_fast_at_the_pa() {
    let harness = fixtures::spm_harness().await;
    let spm_addr = start_spm(harness.service).await;

    let store = Arc::new(RecordStore::open_in_memory().unwrap());
    let pb_addr = start_pb(PbService::new_shared(store)).await;

    let spm_channel = connect(&spm_addr).await;
    let pb_channel = connect(&pb_addr).await;
    let pa_service = PaService::new(SessionStore::new(), SpmClient::new(spm_channel), PbClient::new(pb_channel), false);
    let pa_addr = start_pa(pa_service).await;

    let mut pa_client = PaClient::connect(pa_addr).await.unwrap();

    let mut init_request = Request::new(InitSessionRequest { sku: fixtures::SKU.into(), sku_auth: fixtures::SKU_AUTH_PASSWORD.into() });
    init_request.metadata_mut().insert("x-otprov-user-id", "ate-2".parse().unwrap());
    let session_token = pa_client.init_session(init_request).await.unwrap().into_inner().session_token;

    let device_data = DeviceData {
        device_id: String::new(),
        sku: fixtures::SKU.into(),
        device_life_cycle: DeviceLifeCycle::Prod as i32,
        wrapped_rma_unlock_token: vec![],
        perso_tlv_payload: vec![],
        metadata: vec![],
    };
    let mut register_request = Request::new(RegisterDeviceRequest { device_data: Some(device_data) });
    register_request.metadata_mut().insert("x-otprov-user-id", "ate-2".parse().unwrap());
    register_request.metadata_mut().insert("authorization", session_token.parse().unwrap());

    let err = pa_client.register_device(register_request).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
}
