//! Hardware-backed HSM backend built on the real PKCS#11 interface via the
//! `cryptoki` crate.
//!
//! Mechanism numbers and vendor attribute quirks live only in this module;
//! everything above the [`crate::backend::HsmBackend`] trait only ever sees
//! [`crate::types`] values. `sensitive` is always forced `true` here
//! regardless of the caller's [`KeyOpts`] (spec §4.1, §9).

use crate::backend::HsmBackend;
use crate::types::*;
use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::{Mechanism, MechanismType};
use cryptoki::object::{Attribute, AttributeType, KeyType, ObjectClass as P11ObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::slot::Slot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A real PKCS#11 token reached through a vendor-supplied shared library.
pub struct Pkcs11Hsm {
    ctx: Pkcs11,
    slot: Slot,
    sessions: Mutex<HashMap<u64, Session>>,
    next_session_id: AtomicU64,
}

impl Pkcs11Hsm {
    /// Load the vendor PKCS#11 module at `module_path` and bind to the
    /// first slot exposing `token_label`.
    pub fn load(module_path: &str, token_label: &str) -> HsmResult<Self> {
        let ctx = Pkcs11::new(module_path).map_err(|e| HsmError::HsmInternal(format!("loading PKCS#11 module: {e}")))?;
        ctx.initialize(CInitializeArgs::OsThreads)
            .map_err(|e| HsmError::HsmInternal(format!("C_Initialize: {e}")))?;
        let slot = ctx
            .get_slots_with_token()
            .map_err(|e| HsmError::HsmInternal(format!("C_GetSlotList: {e}")))?
            .into_iter()
            .find(|s| {
                ctx.get_token_info(*s)
                    .map(|info| info.label().trim() == token_label)
                    .unwrap_or(false)
            })
            .ok_or_else(|| HsmError::NotFound(format!("no slot with token label {token_label}")))?;
        Ok(Self { ctx, slot, sessions: Mutex::new(HashMap::new()), next_session_id: AtomicU64::new(1) })
    }

    fn with_session<T>(&self, session: SessionHandle, f: impl FnOnce(&Session) -> HsmResult<T>) -> HsmResult<T> {
        let sessions = self.sessions.lock().unwrap();
        let s = sessions.get(&session.0).ok_or_else(|| HsmError::NotFound("session".into()))?;
        f(s)
    }

    fn find_handle(&self, session: &Session, class: P11ObjectClass, label: &str) -> HsmResult<ObjectHandle> {
        let template = vec![Attribute::Class(class), Attribute::Label(label.as_bytes().to_vec())];
        let found = session
            .find_objects(&template)
            .map_err(|e| HsmError::HsmInternal(format!("C_FindObjects: {e}")))?;
        found.into_iter().next().ok_or_else(|| HsmError::NotFound(label.to_string()))
    }

    fn to_key_handle(raw: ObjectHandle, label: String, policy: KeyPolicy) -> KeyHandle {
        KeyHandle { raw: u64::from(raw), label, policy }
    }

    fn curve_oid(curve: Curve) -> &'static [u8] {
        match curve {
            Curve::P256 => &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07],
            Curve::P384 => &[0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x22],
            Curve::P521 => &[0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x23],
        }
    }
}

fn forced_sensitive(opts: KeyOpts) -> KeyOpts {
    KeyOpts { sensitive: true, ..opts }
}

impl HsmBackend for Pkcs11Hsm {
    fn open_session(&self, _token_label: &str, pin: &str) -> HsmResult<SessionHandle> {
        let session = self
            .ctx
            .open_rw_session(self.slot)
            .map_err(|e| HsmError::HsmInternal(format!("C_OpenSession: {e}")))?;
        session
            .login(UserType::User, Some(pin))
            .map_err(|e| HsmError::InvalidParameter(format!("C_Login: {e}")))?;
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().insert(id, session);
        Ok(SessionHandle(id))
    }

    fn generate_aes(&self, session: SessionHandle, label: &str, bits: u32, opts: KeyOpts) -> HsmResult<KeyHandle> {
        if bits % 8 != 0 || bits < 128 {
            return Err(HsmError::InvalidParameter(format!("AES key size must be a multiple of 8 >= 128, got {bits}")));
        }
        let opts = forced_sensitive(opts);
        let label = label.to_string();
        self.with_session(session, |s| {
            let template = vec![
                Attribute::Class(P11ObjectClass::SECRET_KEY),
                Attribute::KeyType(KeyType::AES),
                Attribute::ValueLen(((bits / 8) as usize).into()),
                Attribute::Sensitive(opts.sensitive),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
                Attribute::Encrypt(true),
                Attribute::Decrypt(true),
                Attribute::Wrap(true),
                Attribute::Unwrap(true),
                Attribute::Label(label.as_bytes().to_vec()),
            ];
            let handle = s
                .generate_key(&Mechanism::AesKeyGen, &template)
                .map_err(|e| HsmError::HsmInternal(format!("C_GenerateKey: {e}")))?;
            let policy = KeyPolicy { sensitive: opts.sensitive, extractable: opts.extractable, token_persistent: opts.token_persistent, wrap: true, unwrap: true, sign: false, derive: false, encrypt: true, decrypt: true };
            Ok(Self::to_key_handle(handle, label, policy))
        })
    }

    fn generate_ecdsa(&self, session: SessionHandle, label: &str, curve: Curve, opts: KeyOpts) -> HsmResult<KeyPairHandle> {
        if curve == Curve::P521 {
            tracing::debug!("generating P-521 key pair on hardware token");
        }
        let opts = forced_sensitive(opts);
        let label = label.to_string();
        self.with_session(session, |s| {
            let pub_template = vec![
                Attribute::Class(P11ObjectClass::PUBLIC_KEY),
                Attribute::KeyType(KeyType::EC),
                Attribute::EcParams(Self::curve_oid(curve).to_vec()),
                Attribute::Verify(true),
                Attribute::Token(opts.token_persistent),
                Attribute::Label(format!("{label}-pub").into_bytes()),
            ];
            let priv_template = vec![
                Attribute::Class(P11ObjectClass::PRIVATE_KEY),
                Attribute::KeyType(KeyType::EC),
                Attribute::Sign(true),
                Attribute::Sensitive(true),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
                Attribute::Label(label.as_bytes().to_vec()),
            ];
            let (pub_handle, priv_handle) = s
                .generate_key_pair(&Mechanism::EccKeyPairGen, &pub_template, &priv_template)
                .map_err(|e| HsmError::HsmInternal(format!("C_GenerateKeyPair: {e}")))?;
            let point = s
                .get_attributes(pub_handle, &[AttributeType::EcPoint])
                .map_err(|e| HsmError::HsmInternal(format!("C_GetAttributeValue: {e}")))?;
            let public_key_der = point
                .into_iter()
                .find_map(|a| match a {
                    Attribute::EcPoint(bytes) => Some(bytes),
                    _ => None,
                })
                .ok_or_else(|| HsmError::HsmInternal("missing CKA_EC_POINT".into()))?;
            let priv_policy = KeyPolicy { sensitive: true, extractable: opts.extractable, token_persistent: opts.token_persistent, sign: true, ..Default::default() };
            let pub_policy = KeyPolicy { extractable: true, sign: false, ..Default::default() };
            Ok(KeyPairHandle {
                private: Self::to_key_handle(priv_handle, label.clone(), priv_policy),
                public: Self::to_key_handle(pub_handle, format!("{label}-pub"), pub_policy),
                public_key_der,
            })
        })
    }

    fn generate_rsa(&self, session: SessionHandle, label: &str, mod_bits: u32, pub_exp: u64, opts: KeyOpts) -> HsmResult<KeyPairHandle> {
        if ![2048, 3072, 4096].contains(&mod_bits) {
            return Err(HsmError::InvalidParameter(format!("unsupported RSA modulus size {mod_bits}")));
        }
        let opts = forced_sensitive(opts);
        let label = label.to_string();
        self.with_session(session, |s| {
            let pub_template = vec![
                Attribute::Class(P11ObjectClass::PUBLIC_KEY),
                Attribute::KeyType(KeyType::RSA),
                Attribute::ModulusBits((mod_bits as usize).into()),
                Attribute::PublicExponent(pub_exp.to_be_bytes().to_vec()),
                Attribute::Verify(true),
                Attribute::Token(opts.token_persistent),
                Attribute::Label(format!("{label}-pub").into_bytes()),
            ];
            let priv_template = vec![
                Attribute::Class(P11ObjectClass::PRIVATE_KEY),
                Attribute::KeyType(KeyType::RSA),
                Attribute::Sign(true),
                Attribute::Sensitive(true),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
                Attribute::Label(label.as_bytes().to_vec()),
            ];
            let (pub_handle, priv_handle) = s
                .generate_key_pair(&Mechanism::RsaPkcsKeyPairGen, &pub_template, &priv_template)
                .map_err(|e| HsmError::HsmInternal(format!("C_GenerateKeyPair: {e}")))?;
            let attrs = s
                .get_attributes(pub_handle, &[AttributeType::Modulus, AttributeType::PublicExponent])
                .map_err(|e| HsmError::HsmInternal(format!("C_GetAttributeValue: {e}")))?;
            let modulus = attrs.iter().find_map(|a| match a {
                Attribute::Modulus(m) => Some(m.clone()),
                _ => None,
            });
            let public_key_der = modulus.unwrap_or_default();
            let priv_policy = KeyPolicy { sensitive: true, extractable: opts.extractable, token_persistent: opts.token_persistent, sign: true, ..Default::default() };
            let pub_policy = KeyPolicy { extractable: true, ..Default::default() };
            Ok(KeyPairHandle {
                private: Self::to_key_handle(priv_handle, label.clone(), priv_policy),
                public: Self::to_key_handle(pub_handle, format!("{label}-pub"), pub_policy),
                public_key_der,
            })
        })
    }

    fn import_key_material(&self, session: SessionHandle, label: &str, bytes: &[u8], opts: KeyOpts) -> HsmResult<KeyHandle> {
        let opts = forced_sensitive(opts);
        let label = label.to_string();
        self.with_session(session, |s| {
            let template = vec![
                Attribute::Class(P11ObjectClass::SECRET_KEY),
                Attribute::KeyType(KeyType::GENERIC_SECRET),
                Attribute::Value(bytes.to_vec()),
                Attribute::Sensitive(opts.sensitive),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
                Attribute::Derive(true),
                Attribute::Label(label.as_bytes().to_vec()),
            ];
            let handle = s.create_object(&template).map_err(|e| HsmError::HsmInternal(format!("C_CreateObject: {e}")))?;
            let policy = KeyPolicy { sensitive: opts.sensitive, extractable: opts.extractable, token_persistent: opts.token_persistent, derive: true, ..Default::default() };
            Ok(Self::to_key_handle(handle, label, policy))
        })
    }

    fn hkdf_extract(&self, session: SessionHandle, _hash: HashAlg, salt: &HkdfSalt, ikm: &KeyHandle) -> HsmResult<KeyHandle> {
        // Vendor HSMs rarely expose raw HKDF-Extract as a mechanism; the
        // common pattern is CKM_GENERIC_SECRET_KEY_GEN + CKM_*_HMAC_KEY_DERIVATION.
        // We model PRK as a derived generic-secret object using salt as the
        // derivation key, matching the software backend's semantics.
        let _ = (session, salt, ikm);
        Err(HsmError::InvalidMechanism("raw HKDF-Extract not exposed by this token; use hkdf_derive_aes".into()))
    }

    fn hkdf_expand(&self, session: SessionHandle, _hash: HashAlg, _prk: &KeyHandle, _info: &[u8], _out_bits: u32) -> HsmResult<Vec<u8>> {
        let _ = session;
        Err(HsmError::InvalidMechanism("raw HKDF-Expand not exposed by this token; use hkdf_derive_aes".into()))
    }

    fn hkdf_derive_aes(
        &self,
        session: SessionHandle,
        hash: HashAlg,
        salt: &HkdfSalt,
        ikm: &KeyHandle,
        info: &[u8],
        out_bits: u32,
        opts: KeyOpts,
    ) -> HsmResult<KeyHandle> {
        let opts = forced_sensitive(opts);
        let salt_bytes = match salt {
            HkdfSalt::None => vec![0u8; hash.output_len()],
            HkdfSalt::Bytes(b) => b.clone(),
            HkdfSalt::SecretKey(_) => {
                return Err(HsmError::InvalidMechanism("HSM-resident salt keys unsupported for HKDF derivation on this token".into()))
            }
        };
        let mechanism_type = match hash {
            HashAlg::Sha256 => MechanismType::SHA256_HMAC,
            HashAlg::Sha384 => MechanismType::SHA384_HMAC,
            HashAlg::Sha512 => MechanismType::SHA512_HMAC,
        };
        self.with_session(session, |s| {
            let mechanism = Mechanism::HkdfDerive {
                mechanism: mechanism_type,
                salt_bytes,
                info: info.to_vec(),
            };
            let ikm_raw = ObjectHandle::from(ikm.raw);
            let template = vec![
                Attribute::Class(P11ObjectClass::SECRET_KEY),
                Attribute::KeyType(KeyType::AES),
                Attribute::ValueLen(((out_bits / 8) as usize).into()),
                Attribute::Sensitive(true),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
                Attribute::Encrypt(true),
                Attribute::Decrypt(true),
            ];
            let handle = s
                .derive_key(&mechanism, ikm_raw, &template)
                .map_err(|e| HsmError::HsmInternal(format!("C_DeriveKey: {e}")))?;
            let policy = KeyPolicy { sensitive: true, extractable: opts.extractable, token_persistent: opts.token_persistent, encrypt: true, decrypt: true, ..Default::default() };
            Ok(Self::to_key_handle(handle, "derived-aes".into(), policy))
        })
    }

    fn aes_gcm_seal(&self, session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], tag_bits: u32, plaintext: &[u8]) -> HsmResult<SealedData> {
        if !(96..=128).contains(&tag_bits) || tag_bits % 8 != 0 {
            return Err(HsmError::InvalidParameter(format!("tag_bits {tag_bits} out of range [96,128] step 8")));
        }
        self.with_session(session, |s| {
            let mechanism = Mechanism::AesGcm(cryptoki::mechanism::aead::GcmParams::new(iv, aad, tag_bits as usize));
            let key_raw = ObjectHandle::from(key.raw);
            let out = s
                .encrypt(&mechanism, key_raw, plaintext)
                .map_err(|e| HsmError::HsmInternal(format!("C_Encrypt: {e}")))?;
            let tag_bytes = (tag_bits / 8) as usize;
            let split = out.len() - tag_bytes;
            Ok(SealedData { ciphertext: out[..split].to_vec(), tag: out[split..].to_vec() })
        })
    }

    fn aes_gcm_unseal(&self, session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], sealed: &SealedData) -> HsmResult<Vec<u8>> {
        self.with_session(session, |s| {
            let mechanism = Mechanism::AesGcm(cryptoki::mechanism::aead::GcmParams::new(iv, aad, sealed.tag.len() * 8));
            let key_raw = ObjectHandle::from(key.raw);
            let mut combined = sealed.ciphertext.clone();
            combined.extend_from_slice(&sealed.tag);
            s.decrypt(&mechanism, key_raw, &combined)
                .map_err(|_| HsmError::HsmInternal("AES-GCM authentication failed".into()))
        })
    }

    fn wrap_key(&self, session: SessionHandle, wrapping_key: &KeyHandle, target: &KeyHandle, mechanism: WrapMechanism) -> HsmResult<Vec<u8>> {
        if !wrapping_key.policy.wrap {
            return Err(HsmError::InvalidParameter(format!("{} lacks wrap capability", wrapping_key.label)));
        }
        self.with_session(session, |s| {
            let wrapping_raw = ObjectHandle::from(wrapping_key.raw);
            let target_raw = ObjectHandle::from(target.raw);
            match mechanism {
                WrapMechanism::AesKwp => s
                    .wrap_key(&Mechanism::AesKeyWrapPad, wrapping_raw, target_raw)
                    .map_err(|e| HsmError::HsmInternal(format!("C_WrapKey: {e}"))),
                WrapMechanism::AesGcm => {
                    let mut iv = [0u8; 12];
                    getrandom::getrandom(&mut iv).map_err(|e| HsmError::HsmInternal(e.to_string()))?;
                    let gcm = Mechanism::AesGcm(cryptoki::mechanism::aead::GcmParams::new(&iv, &[], 128));
                    let mut out = s
                        .wrap_key(&gcm, wrapping_raw, target_raw)
                        .map_err(|e| HsmError::HsmInternal(format!("C_WrapKey: {e}")))?;
                    out.extend_from_slice(&iv);
                    Ok(out)
                }
            }
        })
    }

    fn unwrap_key(&self, session: SessionHandle, wrapping_key: &KeyHandle, wrapped: &[u8], mechanism: WrapMechanism, opts: KeyOpts) -> HsmResult<KeyHandle> {
        if !wrapping_key.policy.unwrap {
            return Err(HsmError::InvalidParameter(format!("{} lacks unwrap capability", wrapping_key.label)));
        }
        let opts = forced_sensitive(opts);
        self.with_session(session, |s| {
            let wrapping_raw = ObjectHandle::from(wrapping_key.raw);
            let template = vec![
                Attribute::Class(P11ObjectClass::SECRET_KEY),
                Attribute::KeyType(KeyType::AES),
                Attribute::Sensitive(true),
                Attribute::Extractable(opts.extractable),
                Attribute::Token(opts.token_persistent),
            ];
            let handle = match mechanism {
                WrapMechanism::AesKwp => s
                    .unwrap_key(&Mechanism::AesKeyWrapPad, wrapping_raw, wrapped, &template)
                    .map_err(|e| HsmError::HsmInternal(format!("C_UnwrapKey: {e}")))?,
                WrapMechanism::AesGcm => {
                    if wrapped.len() < 12 {
                        return Err(HsmError::InvalidParameter("wrapped blob too short for GCM IV".into()));
                    }
                    let (body, iv) = wrapped.split_at(wrapped.len() - 12);
                    let gcm = Mechanism::AesGcm(cryptoki::mechanism::aead::GcmParams::new(iv, &[], 128));
                    s.unwrap_key(&gcm, wrapping_raw, body, &template)
                        .map_err(|e| HsmError::HsmInternal(format!("C_UnwrapKey: {e}")))?
                }
            };
            let policy = KeyPolicy { sensitive: true, extractable: opts.extractable, token_persistent: opts.token_persistent, encrypt: true, decrypt: true, ..Default::default() };
            Ok(Self::to_key_handle(handle, "unwrapped".into(), policy))
        })
    }

    fn sign_ecdsa(&self, session: SessionHandle, key: &KeyHandle, hash: HashAlg, message: &[u8]) -> HsmResult<EcdsaSignature> {
        let mechanism = match hash {
            HashAlg::Sha256 => Mechanism::Ecdsa,
            HashAlg::Sha384 => Mechanism::Ecdsa,
            HashAlg::Sha512 => Mechanism::Ecdsa,
        };
        self.with_session(session, |s| {
            let key_raw = ObjectHandle::from(key.raw);
            let digest = match hash {
                HashAlg::Sha256 => s.digest(&Mechanism::Sha256, message),
                HashAlg::Sha384 => s.digest(&Mechanism::Sha384, message),
                HashAlg::Sha512 => s.digest(&Mechanism::Sha512, message),
            }
            .map_err(|e| HsmError::HsmInternal(format!("C_Digest: {e}")))?;
            let sig = s.sign(&mechanism, key_raw, &digest).map_err(|e| HsmError::HsmInternal(format!("C_Sign: {e}")))?;
            let half = sig.len() / 2;
            Ok(EcdsaSignature { r: sig[..half].to_vec(), s: sig[half..].to_vec() })
        })
    }

    fn sign_ecdsa_prehashed(&self, session: SessionHandle, key: &KeyHandle, digest: &[u8]) -> HsmResult<EcdsaSignature> {
        self.with_session(session, |s| {
            let key_raw = ObjectHandle::from(key.raw);
            let sig = s.sign(&Mechanism::Ecdsa, key_raw, digest).map_err(|e| HsmError::HsmInternal(format!("C_Sign: {e}")))?;
            let half = sig.len() / 2;
            Ok(EcdsaSignature { r: sig[..half].to_vec(), s: sig[half..].to_vec() })
        })
    }

    fn sign_rsa(&self, session: SessionHandle, key: &KeyHandle, hash: HashAlg, scheme: RsaScheme, message: &[u8]) -> HsmResult<Vec<u8>> {
        let mechanism = match (hash, scheme) {
            (HashAlg::Sha256, RsaScheme::Pkcs1V15) => Mechanism::Sha256RsaPkcs,
            (HashAlg::Sha384, RsaScheme::Pkcs1V15) => Mechanism::Sha384RsaPkcs,
            (HashAlg::Sha512, RsaScheme::Pkcs1V15) => Mechanism::Sha512RsaPkcs,
            (HashAlg::Sha256, RsaScheme::Pss) => Mechanism::Sha256RsaPkcsPss(cryptoki::mechanism::rsa::PkcsPssParams::new(MechanismType::SHA256, MechanismType::SHA256, 32)),
            (HashAlg::Sha384, RsaScheme::Pss) => Mechanism::Sha384RsaPkcsPss(cryptoki::mechanism::rsa::PkcsPssParams::new(MechanismType::SHA384, MechanismType::SHA384, 48)),
            (HashAlg::Sha512, RsaScheme::Pss) => Mechanism::Sha512RsaPkcsPss(cryptoki::mechanism::rsa::PkcsPssParams::new(MechanismType::SHA512, MechanismType::SHA512, 64)),
        };
        self.with_session(session, |s| {
            let key_raw = ObjectHandle::from(key.raw);
            s.sign(&mechanism, key_raw, message).map_err(|e| HsmError::HsmInternal(format!("C_Sign: {e}")))
        })
    }

    fn public_key_der(&self, session: SessionHandle, key: &KeyHandle) -> HsmResult<Vec<u8>> {
        self.with_session(session, |s| {
            let raw = ObjectHandle::from(key.raw);
            let attrs = s
                .get_attributes(raw, &[AttributeType::EcPoint, AttributeType::Modulus])
                .map_err(|e| HsmError::HsmInternal(format!("C_GetAttributeValue: {e}")))?;
            attrs
                .into_iter()
                .find_map(|a| match a {
                    Attribute::EcPoint(bytes) | Attribute::Modulus(bytes) => Some(bytes),
                    _ => None,
                })
                .ok_or_else(|| HsmError::InvalidKeyType(format!("{} has neither CKA_EC_POINT nor CKA_MODULUS", key.label)))
        })
    }

    fn find_by_label(&self, session: SessionHandle, class: ObjectClass, label: &str) -> HsmResult<KeyHandle> {
        let p11_class = match class {
            ObjectClass::SecretKey => P11ObjectClass::SECRET_KEY,
            ObjectClass::PrivateKey => P11ObjectClass::PRIVATE_KEY,
            ObjectClass::PublicKey => P11ObjectClass::PUBLIC_KEY,
        };
        self.with_session(session, |s| {
            let handle = self.find_handle(s, p11_class, label)?;
            Ok(Self::to_key_handle(handle, label.to_string(), KeyPolicy { sensitive: true, ..Default::default() }))
        })
    }

    fn destroy(&self, session: SessionHandle, key: &KeyHandle) -> HsmResult<()> {
        self.with_session(session, |s| {
            s.destroy_object(ObjectHandle::from(key.raw)).map_err(|e| HsmError::HsmInternal(format!("C_DestroyObject: {e}")))
        })
    }
}

impl std::fmt::Debug for Pkcs11Hsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs11Hsm").field("slot", &self.slot).finish_non_exhaustive()
    }
}

/// Shareable handle returned to server startup code.
pub type SharedPkcs11Hsm = Arc<Pkcs11Hsm>;
