//! X.509 certificate assembly from an opaque TBS blob plus a raw signature
//! (spec §4.3 `EndorseCerts`).
//!
//! The caller supplies an already-DER-encoded `TBSCertificate`; this module
//! only wraps it with a `signatureAlgorithm` and `signatureValue` to produce
//! the outer `Certificate` SEQUENCE (RFC 5280 §4.1).

use der::asn1::{AnyRef, BitStringRef, ObjectIdentifier};
use der::{Decode, Encode, Sequence};
use otprov_pkcs11_adapter::{EcdsaSignature, HashAlg, RsaScheme};
use otprov_proto::common::SigningAlgorithm;
use sha2::{Digest, Sha256};

const OID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

/// RFC 4055 Appendix A default `RSASSA-PSS-params` for SHA-256 / MGF1-SHA-256
/// / 32-byte salt, pre-encoded as DER (the only PSS profile this service signs
/// with).
const RSASSA_PSS_SHA256_PARAMS_DER: &[u8] = &[
    0x30, 0x34, 0xa0, 0x0f, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00, 0xa1, 0x1c, 0x30,
    0x1a, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x08, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03,
    0x04, 0x02, 0x01, 0x05, 0x00, 0xa2, 0x03, 0x02, 0x01, 0x20,
];

#[derive(Sequence)]
struct AlgorithmIdentifier<'a> {
    algorithm: ObjectIdentifier,
    #[asn1(optional = "true")]
    parameters: Option<AnyRef<'a>>,
}

#[derive(Sequence)]
struct Certificate<'a> {
    tbs_certificate: AnyRef<'a>,
    signature_algorithm: AlgorithmIdentifier<'a>,
    signature_value: BitStringRef<'a>,
}

/// Error producing a certificate: either the TBS bytes weren't a valid DER
/// TLV, or the raw signature couldn't be re-encoded.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("invalid TBS certificate DER: {0}")]
    InvalidTbs(der::Error),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(der::Error),
}

/// ECDSA `(r, s)` big-endian pair, DER-encoded as `SEQUENCE { r INTEGER, s INTEGER }`.
fn ecdsa_signature_der(sig: &EcdsaSignature) -> Result<Vec<u8>, CertError> {
    #[derive(Sequence)]
    struct EcdsaSigValue<'a> {
        r: der::asn1::UintRef<'a>,
        s: der::asn1::UintRef<'a>,
    }
    let r = der::asn1::UintRef::new(&sig.r).map_err(CertError::InvalidSignature)?;
    let s = der::asn1::UintRef::new(&sig.s).map_err(CertError::InvalidSignature)?;
    EcdsaSigValue { r, s }.to_der().map_err(CertError::InvalidSignature)
}

fn algorithm_identifier(algorithm: SigningAlgorithm) -> AlgorithmIdentifier<'static> {
    match algorithm {
        SigningAlgorithm::EcdsaP256Sha256 => AlgorithmIdentifier { algorithm: OID_ECDSA_WITH_SHA256, parameters: None },
        SigningAlgorithm::EcdsaP384Sha384 => AlgorithmIdentifier { algorithm: OID_ECDSA_WITH_SHA384, parameters: None },
        SigningAlgorithm::RsaPkcs1Sha256 => AlgorithmIdentifier { algorithm: OID_SHA256_WITH_RSA_ENCRYPTION, parameters: None },
        SigningAlgorithm::RsaPssSha256 => {
            let params = AnyRef::from_der(RSASSA_PSS_SHA256_PARAMS_DER).expect("constant PSS params are valid DER");
            AlgorithmIdentifier { algorithm: OID_RSASSA_PSS, parameters: Some(params) }
        }
        SigningAlgorithm::Unspecified => unreachable!("caller validates algorithm before reaching cert assembly"),
    }
}

/// Assemble a complete `Certificate` from an already-signed `tbs` blob and
/// the raw ECDSA signature returned by the HSM.
pub fn assemble_ecdsa(tbs: &[u8], algorithm: SigningAlgorithm, sig: &EcdsaSignature) -> Result<Vec<u8>, CertError> {
    let tbs_certificate = AnyRef::from_der(tbs).map_err(CertError::InvalidTbs)?;
    let sig_der = ecdsa_signature_der(sig)?;
    let signature_value = BitStringRef::from_bytes(&sig_der).map_err(CertError::InvalidSignature)?;
    Certificate { tbs_certificate, signature_algorithm: algorithm_identifier(algorithm), signature_value }
        .to_der()
        .map_err(CertError::InvalidSignature)
}

/// Assemble a complete `Certificate` from an already-signed `tbs` blob and a
/// raw PKCS#1-formatted RSA signature (PKCS#1 v1.5 or PSS, per `algorithm`).
pub fn assemble_rsa(tbs: &[u8], algorithm: SigningAlgorithm, signature: &[u8]) -> Result<Vec<u8>, CertError> {
    let tbs_certificate = AnyRef::from_der(tbs).map_err(CertError::InvalidTbs)?;
    let signature_value = BitStringRef::from_bytes(signature).map_err(CertError::InvalidSignature)?;
    Certificate { tbs_certificate, signature_algorithm: algorithm_identifier(algorithm), signature_value }
        .to_der()
        .map_err(CertError::InvalidSignature)
}

/// Subject-key-identifier for a public key, computed as the first 20 bytes
/// of SHA-256 over its SPKI DER. Used both for `GetCaSubjectKeys` and for
/// the `issuer_subject_key_id` returned alongside each endorsed certificate,
/// so the two always agree for the same signing key.
pub fn subject_key_id(public_key_der: &[u8]) -> Vec<u8> {
    Sha256::digest(public_key_der)[..20].to_vec()
}

/// Hash algorithm implied by a `SigningAlgorithm` (spec §3 `KeyParams`).
pub fn hash_for(algorithm: SigningAlgorithm) -> Option<HashAlg> {
    match algorithm {
        SigningAlgorithm::EcdsaP256Sha256 | SigningAlgorithm::RsaPkcs1Sha256 | SigningAlgorithm::RsaPssSha256 => Some(HashAlg::Sha256),
        SigningAlgorithm::EcdsaP384Sha384 => Some(HashAlg::Sha384),
        SigningAlgorithm::Unspecified => None,
    }
}

/// RSA padding scheme implied by a `SigningAlgorithm`, or `None` for ECDSA
/// algorithms.
pub fn rsa_scheme_for(algorithm: SigningAlgorithm) -> Option<RsaScheme> {
    match algorithm {
        SigningAlgorithm::RsaPkcs1Sha256 => Some(RsaScheme::Pkcs1V15),
        SigningAlgorithm::RsaPssSha256 => Some(RsaScheme::Pss),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tbs() -> Vec<u8> {
        // A minimal valid DER SEQUENCE, standing in for a real TBSCertificate.
        der::asn1::OctetStringRef::new(b"tbs-placeholder").unwrap().to_der().unwrap()
    }

    #[test]
    fn ecdsa_certificate_assembles_and_embeds_tbs_verbatim() {
        let tbs = sample_tbs();
        let sig = EcdsaSignature { r: vec![1; 32], s: vec![2; 32] };
        let cert = assemble_ecdsa(&tbs, SigningAlgorithm::EcdsaP256Sha256, &sig).unwrap();
        assert!(cert.len() > tbs.len());
    }

    #[test]
    fn rsa_certificate_assembles() {
        let tbs = sample_tbs();
        let cert = assemble_rsa(&tbs, SigningAlgorithm::RsaPssSha256, &[7u8; 256]).unwrap();
        assert!(cert.len() > tbs.len() + 256);
    }

    #[test]
    fn invalid_tbs_bytes_are_rejected() {
        let sig = EcdsaSignature { r: vec![1], s: vec![2] };
        assert!(assemble_ecdsa(&[0xff, 0xff], SigningAlgorithm::EcdsaP256Sha256, &sig).is_err());
    }

    #[test]
    fn subject_key_id_is_deterministic_and_twenty_bytes() {
        let a = subject_key_id(b"spki-one");
        let b = subject_key_id(b"spki-one");
        let c = subject_key_id(b"spki-two");
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
