//! The backend trait every HSM implementation satisfies (spec §4.1, §9).
//!
//! All operations are blocking and may be slow; the [`crate::pool::SessionPool`]
//! is responsible for running them off the async executor's worker threads.

use crate::types::*;

/// A capability-oriented HSM backend. Implemented by [`crate::software::SoftHsm`]
/// for dev/test and [`crate::hardware::Pkcs11Hsm`] for a real vendor module;
/// both compile to this one surface (spec §9).
pub trait HsmBackend: Send + Sync {
    /// Open a session against the named token, authenticating with `pin`.
    fn open_session(&self, token_label: &str, pin: &str) -> HsmResult<SessionHandle>;

    /// Generate an AES key under `label`. `bits` must be a multiple of 8,
    /// >= 128. Hardware backends force `sensitive = true` regardless of
    /// `opts` (spec §4.1).
    fn generate_aes(&self, session: SessionHandle, label: &str, bits: u32, opts: KeyOpts) -> HsmResult<KeyHandle>;

    /// Generate an ECDSA key pair on the given curve, under `label`.
    fn generate_ecdsa(&self, session: SessionHandle, label: &str, curve: Curve, opts: KeyOpts) -> HsmResult<KeyPairHandle>;

    /// Generate an RSA key pair under `label`.
    fn generate_rsa(&self, session: SessionHandle, label: &str, mod_bits: u32, pub_exp: u64, opts: KeyOpts) -> HsmResult<KeyPairHandle>;

    /// Import generic-secret key material under `label`, usable as an HKDF
    /// precursor.
    fn import_key_material(&self, session: SessionHandle, label: &str, bytes: &[u8], opts: KeyOpts) -> HsmResult<KeyHandle>;

    /// RFC 5869 HKDF-Extract: `PRK = HMAC-Hash(salt, IKM)`.
    fn hkdf_extract(&self, session: SessionHandle, hash: HashAlg, salt: &HkdfSalt, ikm: &KeyHandle) -> HsmResult<KeyHandle>;

    /// RFC 5869 HKDF-Expand: derive `out_bits` of key material from a PRK.
    fn hkdf_expand(&self, session: SessionHandle, hash: HashAlg, prk: &KeyHandle, info: &[u8], out_bits: u32) -> HsmResult<Vec<u8>>;

    /// One-shot HKDF-Extract-then-Expand producing an AES key object.
    fn hkdf_derive_aes(
        &self,
        session: SessionHandle,
        hash: HashAlg,
        salt: &HkdfSalt,
        ikm: &KeyHandle,
        info: &[u8],
        out_bits: u32,
        opts: KeyOpts,
    ) -> HsmResult<KeyHandle>;

    /// AES-GCM authenticated encryption. `tag_bits` in `[96, 128]`, step 8.
    fn aes_gcm_seal(&self, session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], tag_bits: u32, plaintext: &[u8]) -> HsmResult<SealedData>;

    /// AES-GCM authenticated decryption; fails on any tampering.
    fn aes_gcm_unseal(&self, session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], sealed: &SealedData) -> HsmResult<Vec<u8>>;

    /// Wrap `target` under `wrapping_key`. For [`WrapMechanism::AesGcm`] the
    /// returned bytes have the IV appended (spec §4.1).
    fn wrap_key(&self, session: SessionHandle, wrapping_key: &KeyHandle, target: &KeyHandle, mechanism: WrapMechanism) -> HsmResult<Vec<u8>>;

    /// Unwrap `wrapped` under `wrapping_key`, producing a new key object.
    fn unwrap_key(&self, session: SessionHandle, wrapping_key: &KeyHandle, wrapped: &[u8], mechanism: WrapMechanism, opts: KeyOpts) -> HsmResult<KeyHandle>;

    /// ECDSA sign over `message`'s hash.
    fn sign_ecdsa(&self, session: SessionHandle, key: &KeyHandle, hash: HashAlg, message: &[u8]) -> HsmResult<EcdsaSignature>;

    /// ECDSA sign over an already-computed digest.
    fn sign_ecdsa_prehashed(&self, session: SessionHandle, key: &KeyHandle, digest: &[u8]) -> HsmResult<EcdsaSignature>;

    /// RSA sign (PKCS#1 v1.5 or PSS, selected by `scheme`).
    fn sign_rsa(&self, session: SessionHandle, key: &KeyHandle, hash: HashAlg, scheme: RsaScheme, message: &[u8]) -> HsmResult<Vec<u8>>;

    /// Look up an object by class + label.
    fn find_by_label(&self, session: SessionHandle, class: ObjectClass, label: &str) -> HsmResult<KeyHandle>;

    /// SPKI DER of a public-key object (spec §4.1 `KeyPairHandle.public_key_der`).
    /// `key` must be an `ObjectClass::PublicKey` handle, e.g. from `find_by_label`.
    fn public_key_der(&self, session: SessionHandle, key: &KeyHandle) -> HsmResult<Vec<u8>>;

    /// Destroy an HSM-resident object.
    fn destroy(&self, session: SessionHandle, key: &KeyHandle) -> HsmResult<()>;
}
