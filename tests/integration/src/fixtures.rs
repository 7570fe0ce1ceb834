//! Shared scaffolding for the cross-crate scenario tests: a SKU
//! configuration directory, an HSM pre-loaded with the keys that SKU's
//! profile references, and a ready-to-use `SpmService<SoftHsm>`.

use std::sync::Arc;

use der::Encode;
use otprov_pa::IDENTITY_KEY_LABEL;
use otprov_pkcs11_adapter::{Curve, HsmBackend, KeyOpts, SessionHandle, SessionPool, SoftHsm};
use otprov_sku_config::{SkuConfig, SkuRegistry};
use otprov_spm::SpmService;

/// SKU name every fixture registers under.
pub const SKU: &str = "sival";
pub const SKU_AUTH_PASSWORD: &str = "test_password";
pub const DICE_LEAF_LABEL: &str = "SigningKey/Dice/v0";
pub const WAS_ROOT_LABEL: &str = "was-root-secret";
pub const LOW_SECURITY_SEED_LABEL: &str = "LowSecSeed";
pub const SILICON_CREATOR_ID: u16 = 0x0001;
pub const PRODUCT_ID: u16 = 0x0002;

fn write_sku_toml(dir: &std::path::Path) {
    let path = dir.join(format!("{SKU}.toml"));
    std::fs::write(
        &path,
        format!(
            r#"
name = "{SKU}"
auth_passwords = ["{SKU_AUTH_PASSWORD}"]
dice_leaf_label = "{DICE_LEAF_LABEL}"
was_root_key_label = "{WAS_ROOT_LABEL}"
known_silicon_creator_ids = [{SILICON_CREATOR_ID}]
known_product_ids = [{PRODUCT_ID}]

[[ca_descriptors]]
key_label = "{DICE_LEAF_LABEL}"
endorsing_key_label = "CaKey/Dice/v0"
template_reference = "dice_leaf_v0"

[token_seeds.LOW_SECURITY]
kdf_type = "Raw"
hsm_key_label = "{LOW_SECURITY_SEED_LABEL}"
"#
        ),
    )
    .unwrap_or_else(|e| panic!("writing {}: {e}", path.display()));
}

/// An `SpmService<SoftHsm>` plus the handles a test needs to drive
/// lower-level operations (WAS derivation, direct SKU lookups) that the
/// service itself doesn't expose.
pub struct SpmHarness {
    pub service: SpmService<SoftHsm>,
    pub pool: Arc<SessionPool<SoftHsm>>,
    pub session: SessionHandle,
    pub skus: Arc<SkuRegistry>,
}

impl SpmHarness {
    pub fn sku_config(&self) -> SkuConfig {
        self.skus.get(SKU).unwrap().clone()
    }
}

/// Build a fully keyed-up harness bound to one SKU ("sival"): a WAS root
/// secret, a LOW_SECURITY token seed, the DICE leaf signing key, and the
/// PA's fixed identity-endorsement key.
pub async fn spm_harness() -> SpmHarness {
    let dir = tempfile::tempdir().unwrap();
    write_sku_toml(dir.path());
    let skus = Arc::new(SkuRegistry::load_dir(dir.path()).unwrap());

    let hsm = Arc::new(SoftHsm::new());
    let pool = Arc::new(SessionPool::new(hsm.clone(), 4));
    let session = pool.open_session("sival".into(), "1234".into()).await.unwrap();

    provision_keys(hsm, session).await;

    let service = SpmService::new(pool.clone(), session, skus.clone());
    SpmHarness { service, pool, session, skus }
}

async fn provision_keys(hsm: Arc<SoftHsm>, session: SessionHandle) {
    tokio::task::spawn_blocking(move || {
        hsm.import_key_material(session, WAS_ROOT_LABEL, b"was-root-secret-material-32-byte", KeyOpts::default()).unwrap();
        hsm.generate_aes(session, LOW_SECURITY_SEED_LABEL, 256, KeyOpts::default()).unwrap();
        hsm.generate_ecdsa(session, DICE_LEAF_LABEL, Curve::P256, KeyOpts { extractable: true, ..Default::default() }).unwrap();
        hsm.generate_ecdsa(session, IDENTITY_KEY_LABEL, Curve::P256, KeyOpts { extractable: true, ..Default::default() }).unwrap();
    })
    .await
    .unwrap();
}

/// A minimal valid DER TLV, standing in for a real `TBSCertificate` (the
/// SPM never parses its contents beyond checking it's well-formed DER).
pub fn sample_tbs(tag: &[u8]) -> Vec<u8> {
    der::asn1::OctetStringRef::new(tag).unwrap().to_der().unwrap()
}
