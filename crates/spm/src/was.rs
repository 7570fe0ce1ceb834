//! Wafer authentication secret derivation and verification (spec §4.3
//! `EndorseCerts`, Glossary "WAS").

use hmac::{Hmac, Mac};
use otprov_pkcs11_adapter::{HashAlg, HkdfSalt, HsmBackend, HsmResult, ObjectClass, SessionHandle, SessionPool};
use otprov_sku_config::SkuConfig;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derive `K_was` for `(sku, diversifier)`: HKDF-SHA-256 over the SKU's
/// HSM-resident WAS root secret, with `sku || diversifier` as info.
pub async fn derive_k_was<B: HsmBackend + 'static>(
    pool: &SessionPool<B>,
    session: SessionHandle,
    sku: &SkuConfig,
    diversifier: &str,
) -> HsmResult<Vec<u8>> {
    let root_label = sku.was_root_key_label.clone();
    let mut info = sku.name.clone().into_bytes();
    info.extend_from_slice(diversifier.as_bytes());

    pool.execute(move |backend| {
        let root = backend.find_by_label(session, ObjectClass::SecretKey, &root_label)?;
        let prk = backend.hkdf_extract(session, HashAlg::Sha256, &HkdfSalt::None, &root)?;
        backend.hkdf_expand(session, HashAlg::Sha256, &prk, &info, 256)
    })
    .await
}

/// Whether `signature` equals HMAC-SHA-256(`k_was`, concat(`tbs_blobs`))
/// (spec §4.3: "MUST first verify signature ... On signature mismatch fail
/// permission_denied").
pub fn verify_was_signature(k_was: &[u8], tbs_blobs: &[Vec<u8>], signature: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(k_was) else {
        return false;
    };
    for tbs in tbs_blobs {
        mac.update(tbs);
    }
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_matching_hmac_and_rejects_tampering() {
        let k_was = b"0123456789abcdef0123456789abcdef";
        let blobs = vec![b"tbs-one".to_vec(), b"tbs-two".to_vec()];

        let mut mac = HmacSha256::new_from_slice(k_was).unwrap();
        for blob in &blobs {
            mac.update(blob);
        }
        let signature = mac.finalize().into_bytes().to_vec();

        assert!(verify_was_signature(k_was, &blobs, &signature));
        let mut tampered = signature.clone();
        tampered[0] ^= 0xff;
        assert!(!verify_was_signature(k_was, &blobs, &tampered));
        assert!(!verify_was_signature(b"wrong-key-------------------", &blobs, &signature));
    }
}
