//! Spec §8 concrete scenarios 1 and 2, driven straight against
//! `SpmService<SoftHsm>` (no network, no PA in front).

use hmac::{Hmac, Mac};
use otprov_proto::common::{DeviceData, DeviceLifeCycle, KeyParams, SigningAlgorithm, TokenSeed, TokenType};
use otprov_proto::spm::spm_server::Spm;
use otprov_proto::spm::{
    CertBundle, EndorseCertsRequest, GetCaSubjectKeysRequest, InitSessionRequest, TokenParams, VerifyDeviceDataRequest,
};
use otprov_spm::was::derive_k_was;
use sha2::Sha256;
use tonic::Request;

use crate::fixtures::{self, SKU, SKU_AUTH_PASSWORD};

type HmacSha256 = Hmac<Sha256>;

#[tokio::test]
async fn init_session_then_distinct_diversifiers_derive_distinct_tokens() {
    let harness = fixtures::spm_harness().await;

    let init = harness
        .service
        .init_session(Request::new(InitSessionRequest { sku: SKU.into(), sku_auth: SKU_AUTH_PASSWORD.into() }))
        .await
        .unwrap()
        .into_inner();
    assert!(otprov_core::token::is_well_formed_session_token(&init.session_token));
    assert!(init.auth_methods.contains(&"DeriveTokens".to_string()));

    let derive = |diversifier: &str| {
        let params = TokenParams {
            seed: TokenSeed::LowSecurity as i32,
            r#type: TokenType::Raw as i32,
            size_bits: 128,
            diversifier: diversifier.to_string(),
            wrap_seed: false,
        };
        harness.service.derive_tokens(Request::new(otprov_proto::spm::DeriveTokensRequest { sku: SKU.into(), params: vec![params] }))
    };

    let unlock = derive("test_unlock").await.unwrap().into_inner();
    let exit = derive("test_exit").await.unwrap().into_inner();

    assert_eq!(unlock.tokens[0].raw.len(), 16);
    assert_eq!(exit.tokens[0].raw.len(), 16);
    assert_ne!(unlock.tokens[0].raw, exit.tokens[0].raw);
}

#[tokio::test]
async fn init_session_rejects_wrong_sku_auth() {
    let harness = fixtures::spm_harness().await;
    let err = harness
        .service
        .init_session(Request::new(InitSessionRequest { sku: SKU.into(), sku_auth: "wrong".into() }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
async fn endorse_certs_issuer_ski_matches_get_ca_subject_keys() {
    let harness = fixtures::spm_harness().await;
    let config = harness.sku_config();
    let diversifier = "was||hw_origin";

    let k_was = derive_k_was(&harness.pool, harness.session, &config, diversifier).await.unwrap();
    let tbs = fixtures::sample_tbs(b"scenario-2-tbs");
    let mut mac = HmacSha256::new_from_slice(&k_was).unwrap();
    mac.update(&tbs);
    let signature = mac.finalize().into_bytes().to_vec();

    let bundle = CertBundle {
        key_params: Some(KeyParams { key_label: fixtures::DICE_LEAF_LABEL.into(), algorithm: SigningAlgorithm::EcdsaP256Sha256 as i32 }),
        tbs: tbs.clone(),
    };
    let endorsed = harness
        .service
        .endorse_certs(Request::new(EndorseCertsRequest {
            sku: SKU.into(),
            diversifier: diversifier.into(),
            signature,
            bundles: vec![bundle],
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(endorsed.certs.len(), 1);
    assert!(endorsed.certs[0].certificate.len() > tbs.len());

    let keys = harness
        .service
        .get_ca_subject_keys(Request::new(GetCaSubjectKeysRequest { sku: SKU.into(), cert_labels: vec![fixtures::DICE_LEAF_LABEL.into()] }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(endorsed.certs[0].issuer_subject_key_id, keys.subject_key_ids[0]);
}

#[tokio::test]
async fn endorse_certs_rejects_mismatched_was_signature() {
    let harness = fixtures::spm_harness().await;
    let tbs = fixtures::sample_tbs(b"scenario-2-bad-sig");
    let bundle = CertBundle {
        key_params: Some(KeyParams { key_label: fixtures::DICE_LEAF_LABEL.into(), algorithm: SigningAlgorithm::EcdsaP256Sha256 as i32 }),
        tbs,
    };

    let err = harness
        .service
        .endorse_certs(Request::new(EndorseCertsRequest {
            sku: SKU.into(),
            diversifier: "was||hw_origin".into(),
            signature: vec![0u8; 32],
            bundles: vec![bundle],
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::PermissionDenied);
}

#[tokio::test]
async fn verify_device_data_accepts_enumerated_id_and_rejects_unknown_product() {
    let harness = fixtures::spm_harness().await;
    let device_id =
        otprov_core::DeviceId::new(fixtures::SILICON_CREATOR_ID, fixtures::PRODUCT_ID, 0xdead_beef_0000_0001, 0, vec![]).unwrap().to_string();

    let good = DeviceData {
        device_id: device_id.clone(),
        sku: SKU.into(),
        device_life_cycle: DeviceLifeCycle::Prod as i32,
        wrapped_rma_unlock_token: vec![],
        perso_tlv_payload: vec![],
        metadata: vec![],
    };
    harness.service.verify_device_data(Request::new(VerifyDeviceDataRequest { device_data: Some(good) })).await.unwrap();

    let bad_product_id = otprov_core::DeviceId::new(fixtures::SILICON_CREATOR_ID, 0x9999, 1, 0, vec![]).unwrap().to_string();
    let bad = DeviceData {
        device_id: bad_product_id,
        sku: SKU.into(),
        device_life_cycle: DeviceLifeCycle::Prod as i32,
        wrapped_rma_unlock_token: vec![],
        perso_tlv_payload: vec![],
        metadata: vec![],
    };
    let err = harness.service.verify_device_data(Request::new(VerifyDeviceDataRequest { device_data: Some(bad) })).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
}
