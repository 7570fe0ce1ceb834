//! The immutable per-SKU configuration model (spec §3 "SKU configuration").

use otprov_core::config::WrappingMechanism;
use serde::Deserialize;
use std::collections::HashMap;

/// One CA endorsement lane: the private key that signs, the key it is
/// itself endorsed by, and which TBS template it applies to.
#[derive(Debug, Clone, Deserialize)]
pub struct CaDescriptor {
    pub key_label: String,
    pub endorsing_key_label: String,
    pub template_reference: String,
}

/// KDF source for one token-derivation purpose (`LOW_SECURITY`,
/// `HIGH_SECURITY`, `KEYGEN`; spec §4.3 `DeriveTokens`).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSeedConfig {
    pub kdf_type: String,
    pub hsm_key_label: String,
}

/// Key-wrap policy for a SKU; falls back to the process-wide environment
/// default (`OTPROV_WrappingMechanism`) when a SKU doesn't override it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WrappingPolicy {
    pub mechanism: Option<String>,
}

impl WrappingPolicy {
    /// Resolve this SKU's effective mechanism, falling back to `default_mechanism`.
    pub fn resolve(&self, default_mechanism: WrappingMechanism) -> WrappingMechanism {
        match self.mechanism.as_deref() {
            Some("RsaOaep") => WrappingMechanism::RsaOaep,
            Some("RsaPkcs1") => WrappingMechanism::RsaPkcs1,
            _ => default_mechanism,
        }
    }
}

/// Lifecycle-token hash algorithm (spec §9 Open Question: SKU-configuration
/// supplied, never hardcoded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleHashAlgorithm {
    /// First 16 bytes of SHA-256 over the raw token bytes.
    Sha256Truncated,
    /// CMAC-AES over the raw token bytes, truncated to 16 bytes.
    Cmac,
}

/// Parameters controlling how a `HASHED_OT_LC_TOKEN` token is produced
/// from a raw derived token (spec §4.3, §9, SPEC_FULL.md §3.3).
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleHashParams {
    pub algorithm: LifecycleHashAlgorithm,
    /// HSM key label supplying the CMAC key, when `algorithm = Cmac`.
    #[serde(default)]
    pub cmac_key_label: Option<String>,
}

impl Default for LifecycleHashParams {
    fn default() -> Self {
        Self { algorithm: LifecycleHashAlgorithm::Sha256Truncated, cmac_key_label: None }
    }
}

/// One fully-loaded, immutable SKU profile (spec §3 "SKU configuration").
#[derive(Debug, Clone, Deserialize)]
pub struct SkuConfig {
    pub name: String,
    pub auth_passwords: Vec<String>,
    pub ca_descriptors: Vec<CaDescriptor>,
    pub token_seeds: HashMap<String, TokenSeedConfig>,
    #[serde(default)]
    pub wrapping_policy: WrappingPolicy,
    /// Template label -> raw TBS template bytes, hex-encoded on disk.
    #[serde(default)]
    pub tbs_templates: HashMap<String, String>,
    pub dice_leaf_label: String,
    #[serde(default)]
    pub lifecycle_hash: LifecycleHashParams,
    /// HSM-resident secret label used as HKDF IKM when deriving `K_was`
    /// for `EndorseCerts`'s WAS signature check (spec §4.3).
    #[serde(default)]
    pub was_root_key_label: String,
    /// HSM-resident AES key label used to wrap a derived token's raw bytes
    /// when `DeriveTokens` params request `wrap_seed` (spec §4.3: "wrapped
    /// under the SKU's transport-wrap key").
    #[serde(default)]
    pub transport_wrap_key_label: String,
    /// Allow-list for `DeviceId::validate_enumerated` (spec §3.1).
    #[serde(default)]
    pub known_silicon_creator_ids: Vec<u16>,
    #[serde(default)]
    pub known_product_ids: Vec<u16>,
}

impl SkuConfig {
    /// Whether `candidate` is one of this SKU's configured passwords
    /// (spec §4.3 `InitSession`).
    pub fn authorizes(&self, candidate: &str) -> bool {
        self.auth_passwords.iter().any(|p| p == candidate)
    }

    /// Decode a named TBS template's raw bytes.
    pub fn tbs_template(&self, label: &str) -> Option<Vec<u8>> {
        self.tbs_templates.get(label).and_then(|hex_str| hex::decode(hex_str).ok())
    }

    /// Look up a CA descriptor by its signing key label.
    pub fn ca_descriptor(&self, key_label: &str) -> Option<&CaDescriptor> {
        self.ca_descriptors.iter().find(|d| d.key_label == key_label)
    }
}
