//! The PA service: session gateway, authorization, and RPC forwarding
//! (spec §4.4).

use otprov_proto::common::{DeviceData, KeyParams, SigningAlgorithm};
use otprov_proto::pa::pa_server::Pa;
use otprov_proto::pa::{
    CloseSessionRequest, CloseSessionResponse, HealthzRequest as PaHealthzRequest, HealthzResponse as PaHealthzResponse, InitSessionRequest,
    InitSessionResponse, RegisterDeviceRequest, RegisterDeviceResponse, RpcStatus as PaRpcStatus,
};
use otprov_proto::pb::pb_client::PbClient;
use otprov_proto::pb::{HealthzRequest as PbHealthzRequest, Record as PbRecord, RegisterDeviceRequest as PbRegisterDeviceRequest, RpcStatus as PbRpcStatus};
use otprov_proto::spm::spm_client::SpmClient;
use otprov_proto::spm::{
    DeriveTokensRequest, DeriveTokensResponse, EndorseCertsRequest, EndorseCertsResponse, EndorseDataRequest, GetCaSubjectKeysRequest,
    GetCaSubjectKeysResponse, GetOwnerFwBootMessageRequest, GetOwnerFwBootMessageResponse, GetStoredTokensRequest, GetStoredTokensResponse,
    HealthzRequest as SpmHealthzRequest, InitSessionRequest as SpmInitSessionRequest, VerifyDeviceDataRequest,
};
use otprov_session_store::SessionStore;
use prost::Message;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

use crate::authz::authorize;

/// Fixed key label the PA signs `RegisterDevice` payloads under (spec
/// §4.4: "calls `SPM.EndorseData` with a fixed identity key label").
pub const IDENTITY_KEY_LABEL: &str = "pa-device-identity-key";

const IDENTITY_ALGORITHM: SigningAlgorithm = SigningAlgorithm::EcdsaP256Sha256;

/// Session gateway and method authorizer in front of the SPM and PB
/// services.
pub struct PaService {
    sessions: SessionStore,
    spm: SpmClient<Channel>,
    pb: PbClient<Channel>,
    tls_enabled: bool,
}

impl PaService {
    /// Wire together an already-constructed session store and gRPC clients
    /// for the SPM and PB services this PA forwards to.
    pub fn new(sessions: SessionStore, spm: SpmClient<Channel>, pb: PbClient<Channel>, tls_enabled: bool) -> Self {
        Self { sessions, spm, pb, tls_enabled }
    }

    fn authorize<T>(&self, request: &Request<T>, rpc_method: &str) -> Result<(), Status> {
        authorize(&self.sessions, request, rpc_method, self.tls_enabled).map(|_| ())
    }
}

#[tonic::async_trait]
impl Pa for PaService {
    async fn init_session(&self, request: Request<InitSessionRequest>) -> Result<Response<InitSessionResponse>, Status> {
        let user_id = crate::authz::derive_user_id(&request, self.tls_enabled)?;
        let req = request.into_inner();
        let sku = req.sku.clone();

        let mut spm = self.spm.clone();
        let spm_response = spm.init_session(Request::new(SpmInitSessionRequest { sku: req.sku, sku_auth: req.sku_auth })).await?.into_inner();

        // `RegisterDevice` is a PA-native RPC, not one of the SPM crypto
        // methods SPM's own `auth_methods` enumerates, but it's still a PA
        // RPC a session must be allowed to invoke (spec §3 "Session").
        let mut auth_methods = spm_response.auth_methods;
        auth_methods.push("RegisterDevice".to_string());

        let session = self.sessions.init_session(user_id, sku, auth_methods);
        Ok(Response::new(InitSessionResponse { session_token: session.session_token }))
    }

    async fn close_session(&self, request: Request<CloseSessionRequest>) -> Result<Response<CloseSessionResponse>, Status> {
        let user_id = crate::authz::derive_user_id(&request, self.tls_enabled)?;
        self.sessions.close_session(&user_id);
        Ok(Response::new(CloseSessionResponse {}))
    }

    async fn derive_tokens(&self, request: Request<DeriveTokensRequest>) -> Result<Response<DeriveTokensResponse>, Status> {
        self.authorize(&request, "DeriveTokens")?;
        let mut spm = self.spm.clone();
        spm.derive_tokens(Request::new(request.into_inner())).await
    }

    async fn endorse_certs(&self, request: Request<EndorseCertsRequest>) -> Result<Response<EndorseCertsResponse>, Status> {
        self.authorize(&request, "EndorseCerts")?;
        let mut spm = self.spm.clone();
        spm.endorse_certs(Request::new(request.into_inner())).await
    }

    async fn get_ca_subject_keys(&self, request: Request<GetCaSubjectKeysRequest>) -> Result<Response<GetCaSubjectKeysResponse>, Status> {
        self.authorize(&request, "GetCaSubjectKeys")?;
        let mut spm = self.spm.clone();
        spm.get_ca_subject_keys(Request::new(request.into_inner())).await
    }

    async fn get_owner_fw_boot_message(
        &self,
        request: Request<GetOwnerFwBootMessageRequest>,
    ) -> Result<Response<GetOwnerFwBootMessageResponse>, Status> {
        self.authorize(&request, "GetOwnerFwBootMessage")?;
        let mut spm = self.spm.clone();
        spm.get_owner_fw_boot_message(Request::new(request.into_inner())).await
    }

    async fn get_stored_tokens(&self, request: Request<GetStoredTokensRequest>) -> Result<Response<GetStoredTokensResponse>, Status> {
        self.authorize(&request, "GetStoredTokens")?;
        let mut spm = self.spm.clone();
        spm.get_stored_tokens(Request::new(request.into_inner())).await
    }

    async fn register_device(&self, request: Request<RegisterDeviceRequest>) -> Result<Response<RegisterDeviceResponse>, Status> {
        self.authorize(&request, "RegisterDevice")?;
        let req = request.into_inner();
        let device_data = req.device_data.ok_or_else(|| Status::invalid_argument("device_data is required"))?;

        let mut spm = self.spm.clone();
        spm.verify_device_data(Request::new(VerifyDeviceDataRequest { device_data: Some(device_data.clone()) })).await?;

        let payload = encode_device_data(&device_data);
        let endorsement = spm
            .endorse_data(Request::new(EndorseDataRequest {
                sku: device_data.sku.clone(),
                key_params: Some(KeyParams { key_label: IDENTITY_KEY_LABEL.to_string(), algorithm: IDENTITY_ALGORITHM as i32 }),
                data: payload.clone(),
            }))
            .await?
            .into_inner();

        let record = PbRecord {
            device_id: device_data.device_id.clone(),
            sku: device_data.sku.clone(),
            payload,
            auth_pubkey: endorsement.pubkey_der,
            auth_signature: endorsement.signature,
        };

        let mut pb = self.pb.clone();
        let response = match pb.register_device(Request::new(PbRegisterDeviceRequest { record: Some(record) })).await {
            Ok(response) => {
                let inner = response.into_inner();
                RegisterDeviceResponse { status: map_pb_status(inner.status) as i32, error_detail: inner.error_detail }
            }
            Err(status) => RegisterDeviceResponse { status: PaRpcStatus::Internal as i32, error_detail: status.message().to_string() },
        };
        Ok(Response::new(response))
    }

    async fn healthz(&self, _request: Request<PaHealthzRequest>) -> Result<Response<PaHealthzResponse>, Status> {
        let spm_reachable = self.spm.clone().healthz(Request::new(SpmHealthzRequest {})).await.map(|r| r.into_inner().serving).unwrap_or(false);
        let pb_reachable = self.pb.clone().healthz(Request::new(PbHealthzRequest {})).await.map(|r| r.into_inner().serving).unwrap_or(false);
        Ok(Response::new(PaHealthzResponse { serving: true, spm_reachable, pb_reachable }))
    }
}

/// Canonical byte form of a `DeviceData` for signing and storage: its
/// protobuf wire encoding (spec §4.4: "Marshals the `DeviceData` to
/// canonical bytes").
fn encode_device_data(device_data: &DeviceData) -> Vec<u8> {
    device_data.encode_to_vec()
}

/// `otprov.pb.RpcStatus` and `otprov.pa.RpcStatus` enumerate the same
/// taxonomy (`UNSPECIFIED`/`OK`/`INVALID_ARGUMENT`/`INTERNAL`) as distinct
/// generated types; map explicitly rather than relying on their numeric
/// values staying aligned.
fn map_pb_status(status: i32) -> PaRpcStatus {
    match PbRpcStatus::try_from(status).unwrap_or(PbRpcStatus::Unspecified) {
        PbRpcStatus::Unspecified => PaRpcStatus::Unspecified,
        PbRpcStatus::Ok => PaRpcStatus::Ok,
        PbRpcStatus::InvalidArgument => PaRpcStatus::InvalidArgument,
        PbRpcStatus::Internal => PaRpcStatus::Internal,
    }
}
