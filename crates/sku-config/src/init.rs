//! One-time HSM initialization (spec §4.2): ensures every key label a SKU
//! references exists in the token, without disturbing keys already present.

use crate::error::SkuConfigError;
use crate::types::SkuConfig;
use otprov_pkcs11_adapter::{Curve, HsmBackend, KeyOpts, ObjectClass, SessionHandle};

/// Walks a SKU's CA descriptors and token seeds, generating any HSM key
/// that isn't already present by label. Idempotent: re-running with the
/// same `SkuConfig` against a token that already has the keys is a no-op
/// (spec §4.2: "re-running initialization must be idempotent").
pub fn ensure_sku_keys(backend: &dyn HsmBackend, session: SessionHandle, sku: &SkuConfig) -> Result<(), SkuConfigError> {
    for ca in &sku.ca_descriptors {
        ensure_ecdsa_present(backend, session, &ca.key_label, sku)?;
    }
    for seed in sku.token_seeds.values() {
        ensure_secret_present(backend, session, &seed.hsm_key_label, sku)?;
    }
    if !sku.was_root_key_label.is_empty() {
        ensure_secret_present(backend, session, &sku.was_root_key_label, sku)?;
    }
    Ok(())
}

fn ensure_ecdsa_present(backend: &dyn HsmBackend, session: SessionHandle, label: &str, sku: &SkuConfig) -> Result<(), SkuConfigError> {
    match backend.find_by_label(session, ObjectClass::PrivateKey, label) {
        Ok(_) => {
            tracing::debug!(sku = %sku.name, %label, "CA key already present, skipping generation");
            Ok(())
        }
        Err(_) => {
            tracing::info!(sku = %sku.name, %label, "generating CA key");
            backend
                .generate_ecdsa(session, label, Curve::P256, KeyOpts { token_persistent: true, ..Default::default() })
                .map(|_| ())
                .map_err(|e| SkuConfigError::Init { sku: sku.name.clone(), message: e.to_string() })
        }
    }
}

fn ensure_secret_present(backend: &dyn HsmBackend, session: SessionHandle, label: &str, sku: &SkuConfig) -> Result<(), SkuConfigError> {
    match backend.find_by_label(session, ObjectClass::SecretKey, label) {
        Ok(_) => {
            tracing::debug!(sku = %sku.name, %label, "token seed already present, skipping generation");
            Ok(())
        }
        Err(_) => {
            tracing::info!(sku = %sku.name, %label, "generating token seed");
            backend
                .generate_aes(session, label, 256, KeyOpts { token_persistent: true, ..Default::default() })
                .map(|_| ())
                .map_err(|e| SkuConfigError::Init { sku: sku.name.clone(), message: e.to_string() })
        }
    }
}
