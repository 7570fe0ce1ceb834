//! Software-emulated HSM backend: real cryptography, in-process key
//! storage. Used in development and in every test that doesn't require a
//! real HSM (spec §9: "wrapping two different HSM backends ... must
//! compile to the same surface").
//!
//! Unlike [`crate::hardware::Pkcs11Hsm`], this backend does *not* force
//! `sensitive = true` — it honors whatever [`KeyOpts`] the caller supplies,
//! matching spec §4.1's description of the one observable difference
//! between the two backends.

use crate::backend::HsmBackend;
use crate::types::*;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use ecdsa::signature::hazmat::PrehashSigner;
use hmac::{Hmac, Mac};
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use rand::RngCore;
use rsa::pkcs1v15::SigningKey as RsaPkcs1SigningKey;
use rsa::pss::SigningKey as RsaPssSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

enum Material {
    Secret(Vec<u8>),
    EcdsaP256(P256SigningKey),
    EcdsaP384(P384SigningKey),
    RsaPrivate(RsaPrivateKey),
    PublicDer(Vec<u8>),
}

struct Object {
    label: String,
    class: ObjectClass,
    policy: KeyPolicy,
    material: Material,
}

/// An in-memory, software-emulated HSM token.
pub struct SoftHsm {
    objects: Mutex<HashMap<u64, Object>>,
    next_handle: AtomicU64,
    next_session: AtomicU64,
}

impl Default for SoftHsm {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftHsm {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            next_session: AtomicU64::new(1),
        }
    }

    fn alloc_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn policy_from_opts(opts: KeyOpts, wrap: bool, unwrap: bool, sign: bool, derive: bool, encrypt: bool, decrypt: bool) -> KeyPolicy {
        KeyPolicy {
            sensitive: opts.sensitive,
            extractable: opts.extractable,
            token_persistent: opts.token_persistent,
            wrap,
            unwrap,
            sign,
            derive,
            encrypt,
            decrypt,
        }
    }

    fn with_object<T>(&self, key: &KeyHandle, f: impl FnOnce(&Object) -> HsmResult<T>) -> HsmResult<T> {
        let objects = self.objects.lock().unwrap();
        let obj = objects
            .get(&key.raw)
            .ok_or_else(|| HsmError::NotFound(key.label.clone()))?;
        f(obj)
    }

    fn secret_bytes(&self, key: &KeyHandle) -> HsmResult<Vec<u8>> {
        self.with_object(key, |obj| match &obj.material {
            Material::Secret(bytes) => Ok(bytes.clone()),
            _ => Err(HsmError::InvalidKeyType(format!("{} is not a secret key", key.label))),
        })
    }

    fn insert_secret(&self, label: String, bytes: Vec<u8>, policy: KeyPolicy) -> KeyHandle {
        let handle = self.alloc_handle();
        self.objects.lock().unwrap().insert(
            handle,
            Object { label: label.clone(), class: ObjectClass::SecretKey, policy, material: Material::Secret(bytes) },
        );
        KeyHandle { raw: handle, label, policy }
    }

    fn aes_seal_with_key_bytes(key_bytes: &[u8], iv: &[u8], aad: &[u8], tag_bits: u32, plaintext: &[u8]) -> HsmResult<SealedData> {
        if !(96..=128).contains(&tag_bits) || tag_bits % 8 != 0 {
            return Err(HsmError::InvalidParameter(format!("tag_bits {tag_bits} out of range [96,128] step 8")));
        }
        let nonce = Nonce::from_slice(iv);
        let payload = Payload { msg: plaintext, aad };
        let out = match key_bytes.len() {
            16 => Aes128Gcm::new_from_slice(key_bytes)
                .map_err(|e| HsmError::InvalidParameter(e.to_string()))?
                .encrypt(nonce, payload)
                .map_err(|e| HsmError::HsmInternal(e.to_string()))?,
            32 => Aes256Gcm::new_from_slice(key_bytes)
                .map_err(|e| HsmError::InvalidParameter(e.to_string()))?
                .encrypt(nonce, payload)
                .map_err(|e| HsmError::HsmInternal(e.to_string()))?,
            n => return Err(HsmError::InvalidKeyType(format!("unsupported AES key length {n}"))),
        };
        let full_tag_bytes = 16;
        let split = out.len() - full_tag_bytes;
        let (ciphertext, tag) = out.split_at(split);
        let tag_bytes = (tag_bits / 8) as usize;
        Ok(SealedData { ciphertext: ciphertext.to_vec(), tag: tag[..tag_bytes].to_vec() })
    }
}

impl HsmBackend for SoftHsm {
    fn open_session(&self, _token_label: &str, pin: &str) -> HsmResult<SessionHandle> {
        if pin.is_empty() {
            return Err(HsmError::InvalidParameter("empty PIN".into()));
        }
        Ok(SessionHandle(self.next_session.fetch_add(1, Ordering::SeqCst)))
    }

    fn generate_aes(&self, _session: SessionHandle, label: &str, bits: u32, opts: KeyOpts) -> HsmResult<KeyHandle> {
        if bits % 8 != 0 || bits < 128 {
            return Err(HsmError::InvalidParameter(format!("AES key size must be a multiple of 8 >= 128, got {bits}")));
        }
        let mut bytes = vec![0u8; (bits / 8) as usize];
        rand::thread_rng().fill_bytes(&mut bytes);
        let policy = Self::policy_from_opts(opts, true, true, false, false, true, true);
        Ok(self.insert_secret(label.to_string(), bytes, policy))
    }

    fn generate_ecdsa(&self, _session: SessionHandle, label: &str, curve: Curve, opts: KeyOpts) -> HsmResult<KeyPairHandle> {
        let policy = Self::policy_from_opts(opts, false, false, true, false, false, false);
        let handle = self.alloc_handle();
        let (material, public_der): (Material, Vec<u8>) = match curve {
            Curve::P256 => {
                let sk = P256SigningKey::random(&mut rand::thread_rng());
                let vk: P256VerifyingKey = (&sk).into();
                (Material::EcdsaP256(sk), vk.to_encoded_point(false).as_bytes().to_vec())
            }
            Curve::P384 => {
                let sk = P384SigningKey::random(&mut rand::thread_rng());
                let vk: P384VerifyingKey = (&sk).into();
                (Material::EcdsaP384(sk), vk.to_encoded_point(false).as_bytes().to_vec())
            }
            Curve::P521 => return Err(HsmError::InvalidMechanism("P-521 unsupported by software backend".into())),
        };
        let label = label.to_string();
        self.objects.lock().unwrap().insert(
            handle,
            Object { label: label.clone(), class: ObjectClass::PrivateKey, policy, material },
        );
        let pub_handle = self.alloc_handle();
        let pub_policy = KeyPolicy { extractable: true, ..policy };
        self.objects.lock().unwrap().insert(
            pub_handle,
            Object { label: format!("{label}-pub"), class: ObjectClass::PublicKey, policy: pub_policy, material: Material::PublicDer(public_der.clone()) },
        );
        Ok(KeyPairHandle {
            private: KeyHandle { raw: handle, label: label.clone(), policy },
            public: KeyHandle { raw: pub_handle, label: format!("{label}-pub"), policy: pub_policy },
            public_key_der: public_der,
        })
    }

    fn generate_rsa(&self, _session: SessionHandle, label: &str, mod_bits: u32, pub_exp: u64, opts: KeyOpts) -> HsmResult<KeyPairHandle> {
        if ![2048, 3072, 4096].contains(&mod_bits) {
            return Err(HsmError::InvalidParameter(format!("unsupported RSA modulus size {mod_bits}")));
        }
        let exp = rsa::BigUint::from(pub_exp);
        let priv_key = RsaPrivateKey::new_with_exp(&mut rand::thread_rng(), mod_bits as usize, &exp)
            .map_err(|e| HsmError::HsmInternal(e.to_string()))?;
        let pub_key = priv_key.to_public_key();
        let public_der = rsa::pkcs1::EncodeRsaPublicKey::to_pkcs1_der(&pub_key)
            .map_err(|e| HsmError::HsmInternal(e.to_string()))?
            .as_bytes()
            .to_vec();
        let policy = Self::policy_from_opts(opts, false, false, true, false, false, false);
        let handle = self.alloc_handle();
        let label = label.to_string();
        self.objects.lock().unwrap().insert(
            handle,
            Object { label: label.clone(), class: ObjectClass::PrivateKey, policy, material: Material::RsaPrivate(priv_key) },
        );
        let pub_handle = self.alloc_handle();
        let pub_policy = KeyPolicy { extractable: true, ..policy };
        self.objects.lock().unwrap().insert(
            pub_handle,
            Object { label: format!("{label}-pub"), class: ObjectClass::PublicKey, policy: pub_policy, material: Material::PublicDer(public_der.clone()) },
        );
        Ok(KeyPairHandle {
            private: KeyHandle { raw: handle, label: label.clone(), policy },
            public: KeyHandle { raw: pub_handle, label: format!("{label}-pub"), policy: pub_policy },
            public_key_der: public_der,
        })
    }

    fn import_key_material(&self, _session: SessionHandle, label: &str, bytes: &[u8], opts: KeyOpts) -> HsmResult<KeyHandle> {
        if bytes.is_empty() {
            return Err(HsmError::InvalidParameter("empty key material".into()));
        }
        let policy = Self::policy_from_opts(opts, false, false, false, true, false, false);
        Ok(self.insert_secret(label.to_string(), bytes.to_vec(), policy))
    }

    fn hkdf_extract(&self, _session: SessionHandle, hash: HashAlg, salt: &HkdfSalt, ikm: &KeyHandle) -> HsmResult<KeyHandle> {
        let ikm_bytes = self.secret_bytes(ikm)?;
        let salt_bytes = match salt {
            HkdfSalt::None => vec![0u8; hash.output_len()],
            HkdfSalt::Bytes(b) => b.clone(),
            HkdfSalt::SecretKey(k) => self.secret_bytes(k)?,
        };
        let prk = hkdf_extract_raw(hash, &salt_bytes, &ikm_bytes);
        let policy = KeyPolicy { extractable: false, derive: true, ..Default::default() };
        Ok(self.insert_secret(format!("prk-{}", self.alloc_handle()), prk, policy))
    }

    fn hkdf_expand(&self, _session: SessionHandle, hash: HashAlg, prk: &KeyHandle, info: &[u8], out_bits: u32) -> HsmResult<Vec<u8>> {
        let prk_bytes = self.secret_bytes(prk)?;
        hkdf_expand_raw(hash, &prk_bytes, info, (out_bits / 8) as usize)
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
        let prk = self.hkdf_extract(session, hash, salt, ikm)?;
        let bytes = self.hkdf_expand(session, hash, &prk, info, out_bits)?;
        let policy = Self::policy_from_opts(opts, true, true, false, false, true, true);
        Ok(self.insert_secret(format!("derived-aes-{}", self.alloc_handle()), bytes, policy))
    }

    fn aes_gcm_seal(&self, _session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], tag_bits: u32, plaintext: &[u8]) -> HsmResult<SealedData> {
        let key_bytes = self.secret_bytes(key)?;
        Self::aes_seal_with_key_bytes(&key_bytes, iv, aad, tag_bits, plaintext)
    }

    fn aes_gcm_unseal(&self, _session: SessionHandle, key: &KeyHandle, iv: &[u8], aad: &[u8], sealed: &SealedData) -> HsmResult<Vec<u8>> {
        let key_bytes = self.secret_bytes(key)?;
        let nonce = Nonce::from_slice(iv);
        let mut combined = sealed.ciphertext.clone();
        combined.extend_from_slice(&sealed.tag);
        let payload = Payload { msg: &combined, aad };
        match key_bytes.len() {
            16 => Aes128Gcm::new_from_slice(&key_bytes)
                .map_err(|e| HsmError::InvalidParameter(e.to_string()))?
                .decrypt(nonce, payload)
                .map_err(|_| HsmError::HsmInternal("AES-GCM authentication failed".into())),
            32 => Aes256Gcm::new_from_slice(&key_bytes)
                .map_err(|e| HsmError::InvalidParameter(e.to_string()))?
                .decrypt(nonce, payload)
                .map_err(|_| HsmError::HsmInternal("AES-GCM authentication failed".into())),
            n => Err(HsmError::InvalidKeyType(format!("unsupported AES key length {n}"))),
        }
    }

    fn wrap_key(&self, session: SessionHandle, wrapping_key: &KeyHandle, target: &KeyHandle, mechanism: WrapMechanism) -> HsmResult<Vec<u8>> {
        if !wrapping_key.policy.wrap {
            return Err(HsmError::InvalidParameter(format!("{} lacks wrap capability", wrapping_key.label)));
        }
        let wrapping_bytes = self.secret_bytes(wrapping_key)?;
        let target_bytes = self.secret_bytes(target)?;
        match mechanism {
            WrapMechanism::AesKwp => {
                let kek = aes_kw::KekAes256::new(wrapping_bytes.as_slice().try_into().map_err(|_| HsmError::InvalidKeyType("KWP wrapping key must be 256 bits".into()))?);
                kek.wrap_with_padding_vec(&target_bytes).map_err(|e| HsmError::HsmInternal(format!("{e:?}")))
            }
            WrapMechanism::AesGcm => {
                let mut iv = vec![0u8; 12];
                rand::thread_rng().fill_bytes(&mut iv);
                let sealed = Self::aes_seal_with_key_bytes(&wrapping_bytes, &iv, &[], 128, &target_bytes)?;
                let mut out = sealed.ciphertext;
                out.extend_from_slice(&sealed.tag);
                out.extend_from_slice(&iv);
                Ok(out)
            }
        }
        .map(|mut out| {
            let _ = session;
            out.shrink_to_fit();
            out
        })
    }

    fn unwrap_key(&self, _session: SessionHandle, wrapping_key: &KeyHandle, wrapped: &[u8], mechanism: WrapMechanism, opts: KeyOpts) -> HsmResult<KeyHandle> {
        if !wrapping_key.policy.unwrap {
            return Err(HsmError::InvalidParameter(format!("{} lacks unwrap capability", wrapping_key.label)));
        }
        let wrapping_bytes = self.secret_bytes(wrapping_key)?;
        let plaintext = match mechanism {
            WrapMechanism::AesKwp => {
                let kek = aes_kw::KekAes256::new(wrapping_bytes.as_slice().try_into().map_err(|_| HsmError::InvalidKeyType("KWP wrapping key must be 256 bits".into()))?);
                kek.unwrap_with_padding_vec(wrapped).map_err(|_| HsmError::HsmInternal("AES-KWP unwrap failed".into()))?
            }
            WrapMechanism::AesGcm => {
                if wrapped.len() < 12 + 16 {
                    return Err(HsmError::InvalidParameter("wrapped blob too short for GCM IV + tag".into()));
                }
                let (body, iv) = wrapped.split_at(wrapped.len() - 12);
                let (ciphertext, tag) = body.split_at(body.len() - 16);
                self.aes_gcm_unseal(
                    SessionHandle(0),
                    wrapping_key,
                    iv,
                    &[],
                    &SealedData { ciphertext: ciphertext.to_vec(), tag: tag.to_vec() },
                )?
            }
        };
        let policy = Self::policy_from_opts(opts, true, true, false, false, true, true);
        Ok(self.insert_secret(format!("unwrapped-{}", self.alloc_handle()), plaintext, policy))
    }

    fn sign_ecdsa(&self, session: SessionHandle, key: &KeyHandle, hash: HashAlg, message: &[u8]) -> HsmResult<EcdsaSignature> {
        let digest = match hash {
            HashAlg::Sha256 => Sha256::digest(message).to_vec(),
            HashAlg::Sha384 => Sha384::digest(message).to_vec(),
            HashAlg::Sha512 => Sha512::digest(message).to_vec(),
        };
        self.sign_ecdsa_prehashed(session, key, &digest)
    }

    fn sign_ecdsa_prehashed(&self, _session: SessionHandle, key: &KeyHandle, digest: &[u8]) -> HsmResult<EcdsaSignature> {
        self.with_object(key, |obj| match &obj.material {
            Material::EcdsaP256(sk) => {
                let sig: P256Signature = sk.sign_prehash(digest).map_err(|e| HsmError::HsmInternal(e.to_string()))?;
                let bytes = sig.to_bytes();
                let (r, s) = bytes.split_at(32);
                Ok(EcdsaSignature { r: r.to_vec(), s: s.to_vec() })
            }
            Material::EcdsaP384(sk) => {
                let sig: P384Signature = sk.sign_prehash(digest).map_err(|e| HsmError::HsmInternal(e.to_string()))?;
                let bytes = sig.to_bytes();
                let (r, s) = bytes.split_at(48);
                Ok(EcdsaSignature { r: r.to_vec(), s: s.to_vec() })
            }
            _ => Err(HsmError::InvalidKeyType(format!("{} is not an ECDSA private key", key.label))),
        })
    }

    fn sign_rsa(&self, _session: SessionHandle, key: &KeyHandle, hash: HashAlg, scheme: RsaScheme, message: &[u8]) -> HsmResult<Vec<u8>> {
        self.with_object(key, |obj| {
            let Material::RsaPrivate(priv_key) = &obj.material else {
                return Err(HsmError::InvalidKeyType(format!("{} is not an RSA private key", key.label)));
            };
            let mut rng = rand::thread_rng();
            match (hash, scheme) {
                (HashAlg::Sha256, RsaScheme::Pkcs1V15) => {
                    let sk = RsaPkcs1SigningKey::<Sha256>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
                (HashAlg::Sha384, RsaScheme::Pkcs1V15) => {
                    let sk = RsaPkcs1SigningKey::<Sha384>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
                (HashAlg::Sha512, RsaScheme::Pkcs1V15) => {
                    let sk = RsaPkcs1SigningKey::<Sha512>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
                (HashAlg::Sha256, RsaScheme::Pss) => {
                    let sk = RsaPssSigningKey::<Sha256>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
                (HashAlg::Sha384, RsaScheme::Pss) => {
                    let sk = RsaPssSigningKey::<Sha384>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
                (HashAlg::Sha512, RsaScheme::Pss) => {
                    let sk = RsaPssSigningKey::<Sha512>::new(priv_key.clone());
                    Ok(sk.sign_with_rng(&mut rng, message).to_vec())
                }
            }
        })
    }

    fn public_key_der(&self, _session: SessionHandle, key: &KeyHandle) -> HsmResult<Vec<u8>> {
        self.with_object(key, |obj| match &obj.material {
            Material::PublicDer(der) => Ok(der.clone()),
            _ => Err(HsmError::InvalidKeyType(format!("{} is not a public key", key.label))),
        })
    }

    fn find_by_label(&self, _session: SessionHandle, class: ObjectClass, label: &str) -> HsmResult<KeyHandle> {
        let objects = self.objects.lock().unwrap();
        objects
            .iter()
            .find(|(_, obj)| obj.class == class && obj.label == label)
            .map(|(raw, obj)| KeyHandle { raw: *raw, label: obj.label.clone(), policy: obj.policy })
            .ok_or_else(|| HsmError::NotFound(label.to_string()))
    }

    fn destroy(&self, _session: SessionHandle, key: &KeyHandle) -> HsmResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&key.raw)
            .map(|_| ())
            .ok_or_else(|| HsmError::NotFound(key.label.clone()))
    }
}

fn hkdf_extract_raw(hash: HashAlg, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
    match hash {
        HashAlg::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(salt).expect("HMAC accepts any key length");
            mac.update(ikm);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlg::Sha384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(salt).expect("HMAC accepts any key length");
            mac.update(ikm);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlg::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(salt).expect("HMAC accepts any key length");
            mac.update(ikm);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

fn hkdf_expand_raw(hash: HashAlg, prk: &[u8], info: &[u8], out_len: usize) -> HsmResult<Vec<u8>> {
    let mut okm = vec![0u8; out_len];
    let result = match hash {
        HashAlg::Sha256 => hkdf::Hkdf::<Sha256>::from_prk(prk).map(|h| h.expand(info, &mut okm)),
        HashAlg::Sha384 => hkdf::Hkdf::<Sha384>::from_prk(prk).map(|h| h.expand(info, &mut okm)),
        HashAlg::Sha512 => hkdf::Hkdf::<Sha512>::from_prk(prk).map(|h| h.expand(info, &mut okm)),
    };
    match result {
        Ok(Ok(())) => Ok(okm),
        _ => Err(HsmError::InvalidParameter("HKDF-Expand failed: output too long for this hash".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(hsm: &SoftHsm) -> SessionHandle {
        hsm.open_session("test-token", "1234").unwrap()
    }

    #[test]
    fn aes_gcm_round_trips() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let key = hsm.generate_aes(session, "aes-test-key", 256, KeyOpts { extractable: true, ..Default::default() }).unwrap();
        let iv = [7u8; 12];
        let aad = b"associated";
        let plaintext = b"device provisioning payload";
        let sealed = hsm.aes_gcm_seal(session, &key, &iv, aad, 128, plaintext).unwrap();
        let recovered = hsm.aes_gcm_unseal(session, &key, &iv, aad, &sealed).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn aes_gcm_rejects_tampered_tag() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let key = hsm.generate_aes(session, "aes-test-key", 128, KeyOpts::default()).unwrap();
        let iv = [1u8; 12];
        let mut sealed = hsm.aes_gcm_seal(session, &key, &iv, b"aad", 128, b"hello").unwrap();
        sealed.tag[0] ^= 0xff;
        assert!(hsm.aes_gcm_unseal(session, &key, &iv, b"aad", &sealed).is_err());
    }

    #[test]
    fn aes_gcm_rejects_tampered_ciphertext() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let key = hsm.generate_aes(session, "aes-test-key", 128, KeyOpts::default()).unwrap();
        let iv = [1u8; 12];
        let mut sealed = hsm.aes_gcm_seal(session, &key, &iv, b"aad", 128, b"hello").unwrap();
        sealed.ciphertext[0] ^= 0xff;
        assert!(hsm.aes_gcm_unseal(session, &key, &iv, b"aad", &sealed).is_err());
    }

    #[test]
    fn aes_gcm_rejects_tampered_aad() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let key = hsm.generate_aes(session, "aes-test-key", 128, KeyOpts::default()).unwrap();
        let iv = [1u8; 12];
        let sealed = hsm.aes_gcm_seal(session, &key, &iv, b"aad", 128, b"hello").unwrap();
        assert!(hsm.aes_gcm_unseal(session, &key, &iv, b"different-aad", &sealed).is_err());
    }

    #[test]
    fn hkdf_matches_rfc5869_reference_case() {
        // RFC 5869 Appendix A.1 test vector.
        let ikm = hex::decode("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b").unwrap();
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
        let expected_prk = "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5";
        let expected_okm = "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865";

        let prk = hkdf_extract_raw(HashAlg::Sha256, &salt, &ikm);
        assert_eq!(hex::encode(&prk), expected_prk);

        let okm = hkdf_expand_raw(HashAlg::Sha256, &prk, &info, 42).unwrap();
        assert_eq!(hex::encode(&okm), expected_okm);
    }

    #[test]
    fn hkdf_none_salt_is_zero_filled() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let ikm = hsm.import_key_material(session, "ikm", b"ikm-material", KeyOpts::default()).unwrap();
        let via_none = hsm.hkdf_extract(session, HashAlg::Sha256, &HkdfSalt::None, &ikm).unwrap();
        let via_zero = hsm
            .hkdf_extract(session, HashAlg::Sha256, &HkdfSalt::Bytes(vec![0u8; 32]), &ikm)
            .unwrap();
        assert_eq!(hsm.secret_bytes(&via_none).unwrap(), hsm.secret_bytes(&via_zero).unwrap());
    }

    #[test]
    fn ecdsa_p256_signs_and_rejects_wrong_key_type() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let pair = hsm.generate_ecdsa(session, "ecdsa-test-key", Curve::P256, KeyOpts::default()).unwrap();
        let sig = hsm.sign_ecdsa(session, &pair.private, HashAlg::Sha256, b"tbs-certificate-bytes").unwrap();
        assert_eq!(sig.r.len(), 32);
        assert_eq!(sig.s.len(), 32);

        let aes = hsm.generate_aes(session, "aes-test-key", 128, KeyOpts::default()).unwrap();
        assert!(hsm.sign_ecdsa(session, &aes, HashAlg::Sha256, b"x").is_err());
    }

    #[test]
    fn kwp_wrap_unwrap_round_trips() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let kek = hsm.generate_aes(session, "kek", 256, KeyOpts::default()).unwrap();
        let target = hsm.generate_aes(session, "target", 128, KeyOpts { extractable: true, ..Default::default() }).unwrap();
        let target_bytes = hsm.secret_bytes(&target).unwrap();

        let wrapped = hsm.wrap_key(session, &kek, &target, WrapMechanism::AesKwp).unwrap();
        let unwrapped = hsm
            .unwrap_key(session, &kek, &wrapped, WrapMechanism::AesKwp, KeyOpts { extractable: true, ..Default::default() })
            .unwrap();
        assert_eq!(hsm.secret_bytes(&unwrapped).unwrap(), target_bytes);
    }

    #[test]
    fn gcm_wrap_unwrap_round_trips_with_appended_iv() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let kek = hsm.generate_aes(session, "kek", 128, KeyOpts::default()).unwrap();
        let target = hsm.generate_aes(session, "target", 128, KeyOpts { extractable: true, ..Default::default() }).unwrap();
        let target_bytes = hsm.secret_bytes(&target).unwrap();

        let wrapped = hsm.wrap_key(session, &kek, &target, WrapMechanism::AesGcm).unwrap();
        // ciphertext(16) + tag(16) + iv(12)
        assert_eq!(wrapped.len(), 16 + 16 + 12);
        let unwrapped = hsm
            .unwrap_key(session, &kek, &wrapped, WrapMechanism::AesGcm, KeyOpts { extractable: true, ..Default::default() })
            .unwrap();
        assert_eq!(hsm.secret_bytes(&unwrapped).unwrap(), target_bytes);
    }

    #[test]
    fn find_by_label_and_destroy() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        let pair = hsm.generate_ecdsa(session, "ecdsa-findme", Curve::P256, KeyOpts::default()).unwrap();
        let found = hsm.find_by_label(session, ObjectClass::PrivateKey, &pair.private.label).unwrap();
        assert_eq!(found.label, pair.private.label);

        hsm.destroy(session, &pair.private).unwrap();
        assert!(hsm.find_by_label(session, ObjectClass::PrivateKey, &pair.private.label).is_err());
    }

    #[test]
    fn generate_aes_rejects_undersized_keys() {
        let hsm = SoftHsm::new();
        let session = open(&hsm);
        assert!(hsm.generate_aes(session, "aes-bad", 96, KeyOpts::default()).is_err());
        assert!(hsm.generate_aes(session, "aes-bad", 127, KeyOpts::default()).is_err());
    }
}
