//! Vocabulary shared by every HSM backend (spec §4.1).
//!
//! Mechanism identifiers are never exposed here — only well-typed values
//! and opaque handles, so that a software-emulated backend and a real
//! PKCS#11-backed hardware module compile to the same surface (spec §9).

use thiserror::Error;

/// Error classes surfaced by HSM operations (spec §4.1 "Contracts").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HsmError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid mechanism: {0}")]
    InvalidMechanism(String),
    #[error("invalid key type: {0}")]
    InvalidKeyType(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("HSM busy: {0}")]
    HsmBusy(String),
    #[error("HSM internal error: {0}")]
    HsmInternal(String),
}

/// Result type returned by every adapter operation.
pub type HsmResult<T> = Result<T, HsmError>;

/// ECDSA curve selection (spec §4.1 `GenerateECDSA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

/// Hash algorithm selection for HKDF and RSA-PSS/PKCS1 signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    /// Output length of this hash function, in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }
}

/// HKDF salt input (spec §4.1 `HKDFExtract`), tagged so the dispatch never
/// needs dynamic typing (spec §9).
#[derive(Debug, Clone)]
pub enum HkdfSalt {
    /// No salt supplied; a zero-filled salt of hash-output length is used
    /// (spec §9 Open Question resolution).
    None,
    /// Raw salt bytes.
    Bytes(Vec<u8>),
    /// An HSM-resident secret key used as the salt.
    SecretKey(KeyHandle),
}

/// Key-wrap mechanism (spec §4.1 "AES-KWP / AES-GCM wrap and unwrap").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMechanism {
    AesKwp,
    /// When wrapping with GCM, the returned ciphertext has the IV appended
    /// and the consumer must split it back out (spec §4.1).
    AesGcm,
}

/// RSA signature padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaScheme {
    Pkcs1V15,
    Pss,
}

/// Policy bits an HSM-resident key object carries (spec §3 "HSM-resident key").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyPolicy {
    pub sensitive: bool,
    pub extractable: bool,
    pub token_persistent: bool,
    pub wrap: bool,
    pub unwrap: bool,
    pub sign: bool,
    pub derive: bool,
    pub encrypt: bool,
    pub decrypt: bool,
}

/// Caller-requested options when generating or importing a key. The
/// hardware backend always forces `sensitive = true` regardless of what is
/// requested here (spec §4.1 `GenerateAES`, spec §9).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyOpts {
    pub sensitive: bool,
    pub extractable: bool,
    pub token_persistent: bool,
}

/// Object class used by `FindByLabel`/`Destroy` (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    SecretKey,
    PrivateKey,
    PublicKey,
}

/// An opaque handle to a session-resident HSM object, plus the
/// process-local label and policy that describe what it may be used for.
/// `extractable = false` keys must never have their key material surfaced
/// across the RPC boundary (spec §4.1).
#[derive(Debug, Clone)]
pub struct KeyHandle {
    /// Vendor/opaque object reference. Backend-specific; never parsed by
    /// callers.
    pub(crate) raw: u64,
    pub label: String,
    pub policy: KeyPolicy,
}

/// An ECDSA or RSA key pair handle.
#[derive(Debug, Clone)]
pub struct KeyPairHandle {
    pub private: KeyHandle,
    pub public: KeyHandle,
    /// SPKI DER of the public key, always extractable regardless of the
    /// private half's policy.
    pub public_key_der: Vec<u8>,
}

/// A live session against one HSM token (spec §4.1 `OpenSession`).
#[derive(Debug, Clone, Copy)]
pub struct SessionHandle(pub(crate) u64);

/// Output of an `AES-GCM seal` operation.
#[derive(Debug, Clone)]
pub struct SealedData {
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Big-endian `(r, s)` pair returned by ECDSA signing operations.
#[derive(Debug, Clone)]
pub struct EcdsaSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}
