//! The SPM service (spec §4.3): the HSM-mediated cryptographic engine,
//! reachable only from the PA.

use std::sync::Arc;

use otprov_core::device_id::DeviceId;
use otprov_core::error::ProvisioningError;
use otprov_core::token;
use otprov_pkcs11_adapter::{HashAlg, HkdfSalt, HsmBackend, KeyOpts, ObjectClass, SessionHandle, SessionPool, WrapMechanism};
use otprov_proto::common::{DeviceData, KeyParams, SigningAlgorithm, TokenSeed, TokenType};
use otprov_proto::spm::{
    spm_server::Spm, DeriveTokensRequest, DeriveTokensResponse, DerivedToken, EndorseCertsRequest, EndorseCertsResponse, EndorseDataRequest,
    EndorseDataResponse, EndorsedCert, GetCaSubjectKeysRequest, GetCaSubjectKeysResponse, GetOwnerFwBootMessageRequest,
    GetOwnerFwBootMessageResponse, GetStoredTokensRequest, GetStoredTokensResponse, HealthzRequest, HealthzResponse, InitSessionRequest,
    InitSessionResponse, StoredToken, VerifyDeviceDataRequest, VerifyDeviceDataResponse,
};
use otprov_sku_config::{SkuConfig, SkuRegistry};
use tonic::{Request, Response, Status};

use crate::cert;
use crate::error::{from_hsm_error, from_sku_config_error};
use crate::lifecycle_hash::hash_lifecycle_token;
use crate::was::{derive_k_was, verify_was_signature};

/// RPC method names forwarded verbatim by the PA once a session is
/// established (spec §4.4 "Forwarding RPCs"); returned from `InitSession` as
/// `auth_methods` alongside `RegisterDevice`'s supporting calls.
pub const CRYPTO_METHODS: &[&str] =
    &["DeriveTokens", "EndorseCerts", "EndorseData", "GetCaSubjectKeys", "GetOwnerFwBootMessage", "GetStoredTokens", "VerifyDeviceData"];

/// The cryptographic engine. Generic over the HSM backend so a process can
/// be built against [`otprov_pkcs11_adapter::SoftHsm`] or
/// [`otprov_pkcs11_adapter::Pkcs11Hsm`] at the binary level, with the same
/// service logic either way.
pub struct SpmService<B: HsmBackend + 'static> {
    pool: Arc<SessionPool<B>>,
    session: SessionHandle,
    skus: Arc<SkuRegistry>,
}

impl<B: HsmBackend + 'static> SpmService<B> {
    /// Construct a service bound to one already-open HSM session and SKU
    /// registry.
    pub fn new(pool: Arc<SessionPool<B>>, session: SessionHandle, skus: Arc<SkuRegistry>) -> Self {
        Self { pool, session, skus }
    }

    fn sku(&self, name: &str) -> Result<SkuConfig, ProvisioningError> {
        self.skus.get(name).map(SkuConfig::clone).map_err(from_sku_config_error)
    }

    /// spec §4.3 `InitSession`: validate `sku_auth` against the SKU's
    /// configured passwords, then hand back a freshly generated token and
    /// this SPM's full crypto method list.
    async fn do_init_session(&self, sku: String, sku_auth: String) -> Result<(String, Vec<String>), ProvisioningError> {
        let config = self.sku(&sku)?;
        if !config.authorizes(&sku_auth) {
            return Err(ProvisioningError::unauthenticated("sku_auth does not match any configured password"));
        }
        Ok((token::random_token(token::SESSION_TOKEN_LEN), CRYPTO_METHODS.iter().map(|s| s.to_string()).collect()))
    }

    /// spec §4.3 `DeriveTokens`.
    async fn do_derive_tokens(&self, sku: String, params: Vec<TokenParamsIn>) -> Result<Vec<DerivedTokenOut>, ProvisioningError> {
        let config = self.sku(&sku)?;
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let seed_name = token_seed_name(p.seed)?;
            let seed_cfg = config
                .token_seeds
                .get(seed_name)
                .ok_or_else(|| ProvisioningError::invalid_argument(format!("SKU {sku} has no token seed configured for {seed_name}")))?;
            if p.size_bits != 128 && p.size_bits != 256 {
                return Err(ProvisioningError::invalid_argument("size_bits must be 128 or 256"));
            }

            let seed_label = seed_cfg.hsm_key_label.clone();
            let diversifier = p.diversifier.clone();
            let size_bits = p.size_bits;
            let session = self.session;
            let raw = self
                .pool
                .execute(move |backend| {
                    let ikm = backend.find_by_label(session, ObjectClass::SecretKey, &seed_label)?;
                    let prk = backend.hkdf_extract(session, HashAlg::Sha256, &HkdfSalt::None, &ikm)?;
                    backend.hkdf_expand(session, HashAlg::Sha256, &prk, diversifier.as_bytes(), size_bits)
                })
                .await
                .map_err(from_hsm_error)?;

            let raw = match p.token_type {
                TokenType::Raw => raw,
                TokenType::HashedOtLcToken => {
                    let hash_params = config.lifecycle_hash.clone();
                    let session = self.session;
                    self.pool.execute(move |backend| hash_lifecycle_token(backend, session, &hash_params, &raw)).await.map_err(from_hsm_error)?
                }
                TokenType::Unspecified => return Err(ProvisioningError::invalid_argument("params.type must be set")),
            };

            let wrapped = if p.wrap_seed {
                if config.transport_wrap_key_label.is_empty() {
                    return Err(ProvisioningError::invalid_argument(format!("SKU {sku} has no transport_wrap_key_label configured")));
                }
                let wrap_label = config.transport_wrap_key_label.clone();
                let raw_for_wrap = raw.clone();
                let session = self.session;
                self.pool
                    .execute(move |backend| {
                        let wrapping_key = backend.find_by_label(session, ObjectClass::SecretKey, &wrap_label)?;
                        let ephemeral = backend.import_key_material(session, "derive-tokens-ephemeral", &raw_for_wrap, KeyOpts::default())?;
                        let wrapped = backend.wrap_key(session, &wrapping_key, &ephemeral, WrapMechanism::AesKwp)?;
                        backend.destroy(session, &ephemeral)?;
                        Ok(wrapped)
                    })
                    .await
                    .map_err(from_hsm_error)?
            } else {
                Vec::new()
            };

            out.push(DerivedTokenOut { raw, wrapped });
        }
        Ok(out)
    }

    /// spec §4.3 `EndorseCerts`: WAS signature must verify before any
    /// bundle is signed.
    async fn do_endorse_certs(
        &self,
        sku: String,
        diversifier: String,
        signature: Vec<u8>,
        bundles: Vec<(KeyParams, Vec<u8>)>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ProvisioningError> {
        let config = self.sku(&sku)?;
        let k_was = derive_k_was(&self.pool, self.session, &config, &diversifier).await.map_err(from_hsm_error)?;
        let tbs_blobs: Vec<Vec<u8>> = bundles.iter().map(|(_, tbs)| tbs.clone()).collect();
        if !verify_was_signature(&k_was, &tbs_blobs, &signature) {
            return Err(ProvisioningError::permission_denied("WAS signature mismatch"));
        }

        let mut out = Vec::with_capacity(bundles.len());
        for (key_params, tbs) in bundles {
            out.push(self.sign_and_assemble(&key_params, &tbs).await?);
        }
        Ok(out)
    }

    async fn sign_and_assemble(&self, key_params: &KeyParams, tbs: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ProvisioningError> {
        let algorithm = SigningAlgorithm::try_from(key_params.algorithm)
            .map_err(|_| ProvisioningError::invalid_argument("unknown signing algorithm"))?;
        let (signature_bytes, public_key_der) = self.sign_bytes(&key_params.key_label, algorithm, tbs).await?;

        let certificate = match cert::rsa_scheme_for(algorithm) {
            Some(_) => cert::assemble_rsa(tbs, algorithm, &signature_bytes),
            None => {
                let half = signature_bytes.len() / 2;
                let ecdsa_sig =
                    otprov_pkcs11_adapter::EcdsaSignature { r: signature_bytes[..half].to_vec(), s: signature_bytes[half..].to_vec() };
                cert::assemble_ecdsa(tbs, algorithm, &ecdsa_sig)
            }
        }
        .map_err(|e| ProvisioningError::internal(e.to_string()))?;

        Ok((certificate, cert::subject_key_id(&public_key_der)))
    }

    /// Sign `message` with the private key at `label`, returning the raw
    /// signature bytes (ECDSA: `r || s`; RSA: the PKCS#1 signature) and the
    /// SPKI DER of the matching public key.
    async fn sign_bytes(&self, label: &str, algorithm: SigningAlgorithm, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ProvisioningError> {
        let hash = cert::hash_for(algorithm).ok_or_else(|| ProvisioningError::invalid_argument("algorithm must be set"))?;
        let label = label.to_string();
        let message = message.to_vec();
        let session = self.session;

        if let Some(scheme) = cert::rsa_scheme_for(algorithm) {
            self.pool
                .execute(move |backend| {
                    let key = backend.find_by_label(session, ObjectClass::PrivateKey, &label)?;
                    let pub_handle = backend.find_by_label(session, ObjectClass::PublicKey, &public_key_label(&label))?;
                    let sig = backend.sign_rsa(session, &key, hash, scheme, &message)?;
                    let pubkey_der = backend.public_key_der(session, &pub_handle)?;
                    Ok((sig, pubkey_der))
                })
                .await
                .map_err(from_hsm_error)
        } else {
            self.pool
                .execute(move |backend| {
                    let key = backend.find_by_label(session, ObjectClass::PrivateKey, &label)?;
                    let pub_handle = backend.find_by_label(session, ObjectClass::PublicKey, &public_key_label(&label))?;
                    let sig = backend.sign_ecdsa(session, &key, hash, &message)?;
                    let pubkey_der = backend.public_key_der(session, &pub_handle)?;
                    let mut flat = sig.r;
                    flat.extend_from_slice(&sig.s);
                    Ok((flat, pubkey_der))
                })
                .await
                .map_err(from_hsm_error)
        }
    }

    /// spec §4.3 `EndorseData`: same signing discipline as `EndorseCerts`,
    /// but over arbitrary bytes rather than a TBS certificate.
    async fn do_endorse_data(&self, key_params: KeyParams, data: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>), ProvisioningError> {
        let algorithm = SigningAlgorithm::try_from(key_params.algorithm)
            .map_err(|_| ProvisioningError::invalid_argument("unknown signing algorithm"))?;
        let (signature, pubkey_der) = self.sign_bytes(&key_params.key_label, algorithm, &data).await?;
        Ok((pubkey_der, signature))
    }

    /// spec §4.3 `GetCaSubjectKeys`.
    async fn do_get_ca_subject_keys(&self, sku: String, cert_labels: Vec<String>) -> Result<Vec<Vec<u8>>, ProvisioningError> {
        let config = self.sku(&sku)?;
        let mut out = Vec::with_capacity(cert_labels.len());
        for label in cert_labels {
            let ca = config
                .ca_descriptor(&label)
                .ok_or_else(|| ProvisioningError::not_found(format!("no CA descriptor for key_label {label}")))?;
            let pub_label = public_key_label(&ca.key_label);
            let session = self.session;
            let pubkey_der = self
                .pool
                .execute(move |backend| {
                    let pub_handle = backend.find_by_label(session, ObjectClass::PublicKey, &pub_label)?;
                    backend.public_key_der(session, &pub_handle)
                })
                .await
                .map_err(from_hsm_error)?;
            out.push(cert::subject_key_id(&pubkey_der));
        }
        Ok(out)
    }

    /// spec §4.3 `VerifyDeviceData`: structural validation against §3
    /// invariants, plus SKU-specific enumeration checks.
    async fn do_verify_device_data(&self, device_data: &DeviceData) -> Result<(), ProvisioningError> {
        let device_id: DeviceId = device_data.device_id.parse()?;

        let config = self.sku(&device_data.sku)?;
        device_id
            .validate_enumerated(&config.known_silicon_creator_ids, &config.known_product_ids)
            .map_err(|e| ProvisioningError::invalid_argument(e.to_string()))?;

        if device_data.wrapped_rma_unlock_token.len() > 256 {
            return Err(ProvisioningError::invalid_argument("wrapped_rma_unlock_token exceeds 256 bytes"));
        }
        if device_data.perso_tlv_payload.len() > 8192 {
            return Err(ProvisioningError::invalid_argument("perso_tlv_payload exceeds 8192 bytes"));
        }
        if device_data.metadata.len() > 1024 {
            return Err(ProvisioningError::invalid_argument("metadata exceeds 1024 bytes"));
        }
        if device_data.device_life_cycle == 0 {
            return Err(ProvisioningError::invalid_argument("device_life_cycle must be set"));
        }
        Ok(())
    }

    /// spec §4.3 `GetStoredTokens`: a read-only lookup against SKU
    /// configuration, not the HSM.
    async fn do_get_stored_tokens(&self, sku: String, labels: Vec<String>) -> Result<Vec<(String, Vec<u8>)>, ProvisioningError> {
        let config = self.sku(&sku)?;
        let mut out = Vec::with_capacity(labels.len());
        for label in labels {
            let value = config.tbs_template(&label).ok_or_else(|| ProvisioningError::not_found(format!("no stored token for {label}")))?;
            out.push((label, value));
        }
        Ok(out)
    }

    /// spec §4.3 `GetOwnerFwBootMessage`: read-only lookup against SKU
    /// configuration.
    async fn do_get_owner_fw_boot_message(&self, sku: String) -> Result<Vec<u8>, ProvisioningError> {
        let config = self.sku(&sku)?;
        config.tbs_template("owner_fw_boot_message").ok_or_else(|| ProvisioningError::not_found("no owner_fw_boot_message configured"))
    }
}

/// The adapter stores a key pair's public half under a `-pub`-suffixed
/// label distinct from the private half (see `software.rs`/`hardware.rs`
/// `generate_ecdsa`/`generate_rsa`); every lookup of a signing key's public
/// counterpart must go through this.
fn public_key_label(private_label: &str) -> String {
    format!("{private_label}-pub")
}

fn token_seed_name(seed: TokenSeed) -> Result<&'static str, ProvisioningError> {
    match seed {
        TokenSeed::LowSecurity => Ok("LOW_SECURITY"),
        TokenSeed::HighSecurity => Ok("HIGH_SECURITY"),
        TokenSeed::Keygen => Ok("KEYGEN"),
        TokenSeed::Unspecified => Err(ProvisioningError::invalid_argument("params.seed must be set")),
    }
}

/// Host-side view of a `TokenParams` request entry, decoded from its wire
/// `i32` enum fields.
struct TokenParamsIn {
    seed: TokenSeed,
    token_type: TokenType,
    size_bits: u32,
    diversifier: String,
    wrap_seed: bool,
}

/// Host-side view of one `DeriveTokens` result entry.
struct DerivedTokenOut {
    raw: Vec<u8>,
    wrapped: Vec<u8>,
}

#[tonic::async_trait]
impl<B: HsmBackend + 'static> Spm for SpmService<B> {
    async fn init_session(&self, request: Request<InitSessionRequest>) -> Result<Response<InitSessionResponse>, Status> {
        let req = request.into_inner();
        let (session_token, auth_methods) = self.do_init_session(req.sku, req.sku_auth).await?;
        Ok(Response::new(InitSessionResponse { session_token, auth_methods }))
    }

    async fn derive_tokens(&self, request: Request<DeriveTokensRequest>) -> Result<Response<DeriveTokensResponse>, Status> {
        let req = request.into_inner();
        let mut params = Vec::with_capacity(req.params.len());
        for p in req.params {
            params.push(TokenParamsIn {
                seed: TokenSeed::try_from(p.seed).map_err(|_| Status::from(ProvisioningError::invalid_argument("unknown seed")))?,
                token_type: TokenType::try_from(p.r#type).map_err(|_| Status::from(ProvisioningError::invalid_argument("unknown type")))?,
                size_bits: p.size_bits,
                diversifier: p.diversifier,
                wrap_seed: p.wrap_seed,
            });
        }
        let tokens = self.do_derive_tokens(req.sku, params).await?;
        Ok(Response::new(DeriveTokensResponse {
            tokens: tokens.into_iter().map(|t| DerivedToken { raw: t.raw, wrapped: t.wrapped }).collect(),
        }))
    }

    async fn endorse_certs(&self, request: Request<EndorseCertsRequest>) -> Result<Response<EndorseCertsResponse>, Status> {
        let req = request.into_inner();
        let bundles = req.bundles.into_iter().map(|b| (b.key_params.unwrap_or_default(), b.tbs)).collect();
        let certs = self.do_endorse_certs(req.sku, req.diversifier, req.signature, bundles).await?;
        Ok(Response::new(EndorseCertsResponse {
            certs: certs.into_iter().map(|(certificate, issuer_subject_key_id)| EndorsedCert { certificate, issuer_subject_key_id }).collect(),
        }))
    }

    async fn endorse_data(&self, request: Request<EndorseDataRequest>) -> Result<Response<EndorseDataResponse>, Status> {
        let req = request.into_inner();
        let key_params = req.key_params.unwrap_or_default();
        let (pubkey_der, signature) = self.do_endorse_data(key_params, req.data).await?;
        Ok(Response::new(EndorseDataResponse { pubkey_der, signature }))
    }

    async fn get_ca_subject_keys(&self, request: Request<GetCaSubjectKeysRequest>) -> Result<Response<GetCaSubjectKeysResponse>, Status> {
        let req = request.into_inner();
        let subject_key_ids = self.do_get_ca_subject_keys(req.sku, req.cert_labels).await?;
        Ok(Response::new(GetCaSubjectKeysResponse { subject_key_ids }))
    }

    async fn verify_device_data(&self, request: Request<VerifyDeviceDataRequest>) -> Result<Response<VerifyDeviceDataResponse>, Status> {
        let req = request.into_inner();
        let device_data = req.device_data.ok_or_else(|| Status::from(ProvisioningError::invalid_argument("device_data is required")))?;
        self.do_verify_device_data(&device_data).await?;
        Ok(Response::new(VerifyDeviceDataResponse {}))
    }

    async fn get_stored_tokens(&self, request: Request<GetStoredTokensRequest>) -> Result<Response<GetStoredTokensResponse>, Status> {
        let req = request.into_inner();
        let tokens = self.do_get_stored_tokens(req.sku, req.labels).await?;
        Ok(Response::new(GetStoredTokensResponse { tokens: tokens.into_iter().map(|(label, value)| StoredToken { label, value }).collect() }))
    }

    async fn get_owner_fw_boot_message(
        &self,
        request: Request<GetOwnerFwBootMessageRequest>,
    ) -> Result<Response<GetOwnerFwBootMessageResponse>, Status> {
        let req = request.into_inner();
        let message = self.do_get_owner_fw_boot_message(req.sku).await?;
        Ok(Response::new(GetOwnerFwBootMessageResponse { message }))
    }

    async fn healthz(&self, _request: Request<HealthzRequest>) -> Result<Response<HealthzResponse>, Status> {
        Ok(Response::new(HealthzResponse { serving: true }))
    }
}
