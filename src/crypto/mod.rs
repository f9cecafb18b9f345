//! The crypto module contains the envelope formats (compact, JSON
//! multi-recipient, ECDH-ES), resource streaming, key export, and signing.
//! The primitives they're built from live in [`base`].

pub mod base;
pub mod compact;
pub mod jwk;
pub mod message;
pub mod permission;
pub mod resource;
pub mod sign;

use crate::{
    crypto::base::{legacy_kdf, SymmetricKey, SymmetricKeySpec},
    error::{Error, Result},
};
use std::collections::HashMap;

/// AES-256 key size, in bytes.
pub const A256GCM_KEY_SIZE: usize = 32;
/// GCM IV size, in bytes.
pub const A256GCM_IV_SIZE: usize = 12;
/// GCM tag size, in bytes.
pub const A256GCM_TAG_SIZE: usize = 16;
/// Both KDFs are a single SHA-256 round.
pub const MAX_DERIVED_KEY_BITS: usize = 256;

/// Header values. There is exactly one supported combination per envelope
/// form, and anything else is rejected.
pub const ALG_DIR: &str = "dir";
pub const ALG_A256GCMKW: &str = "A256GCMKW";
pub const ALG_ECDH_ES: &str = "ECDH-ES";
pub const ENC_A256GCM: &str = "A256GCM";

/// Looks up symmetric keys by key id. Decryption asks one of these for the
/// key named in the envelope.
///
/// Return [`Error::NoSuchKey`] when there's no key for the id: the
/// multi-recipient decrypt treats that as "try the next recipient" and every
/// other error as fatal.
pub trait KeyProvider {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey>;
}

impl<T: KeyProvider + ?Sized> KeyProvider for &T {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        (**self).get_key(key_id)
    }
}

impl KeyProvider for SymmetricKeySpec {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        if self.key_id() == key_id {
            Ok(self.key().clone())
        } else {
            Err(Error::NoSuchKey(key_id.into()))
        }
    }
}

impl KeyProvider for [SymmetricKeySpec] {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        self.iter()
            .find(|spec| spec.key_id() == key_id)
            .map(|spec| spec.key().clone())
            .ok_or_else(|| Error::NoSuchKey(key_id.into()))
    }
}

impl KeyProvider for Vec<SymmetricKeySpec> {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        self.as_slice().get_key(key_id)
    }
}

impl KeyProvider for HashMap<String, SymmetricKey> {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        self.get(key_id).cloned().ok_or_else(|| Error::NoSuchKey(key_id.into()))
    }
}

/// Derives the key for any key id from a shared secret with the legacy KDF.
/// Never says "no such key".
#[derive(Debug, Clone, Copy)]
pub struct SharedSecretKeys<'a>(pub &'a [u8]);

impl<'a> KeyProvider for SharedSecretKeys<'a> {
    fn get_key(&self, key_id: &str) -> Result<SymmetricKey> {
        let derived = legacy_kdf(self.0, key_id, A256GCM_KEY_SIZE * 8)?;
        SymmetricKey::from_slice(&derived)
    }
}

/// The AAD every envelope form authenticates: the base64url protected header
/// as ASCII, plus `.` and the extra value if there is one.
pub(crate) fn envelope_aad(protected_b64: &str, extra: Option<&[u8]>) -> Vec<u8> {
    let mut aad = protected_b64.as_bytes().to_vec();
    if let Some(extra) = extra.filter(|x| !x.is_empty()) {
        aad.push(b'.');
        aad.extend_from_slice(extra);
    }
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers() {
        let mut rng = crate::util::test::rng();
        let one = SymmetricKeySpec::generate(&mut rng, "one");
        let two = SymmetricKeySpec::generate(&mut rng, "two");

        assert_eq!(one.get_key("one").unwrap(), *one.key());
        assert_eq!(one.get_key("two"), Err(Error::NoSuchKey("two".into())));

        let list = vec![one.clone(), two.clone()];
        assert_eq!(list.get_key("two").unwrap(), *two.key());
        assert!(list.get_key("three").unwrap_err().is_no_such_key());
        assert_eq!((&list[..1]).get_key("one").unwrap(), *one.key());

        let mut map = HashMap::new();
        map.insert("two".to_string(), two.key().clone());
        assert_eq!(map.get_key("two").unwrap(), *two.key());
        assert!(map.get_key("one").unwrap_err().is_no_such_key());
    }

    #[test]
    fn shared_secret_provider() {
        let secret = (0u8..32).collect::<Vec<_>>();
        let key = SharedSecretKeys(&secret).get_key("test").unwrap();
        let expected = legacy_kdf(&secret, "test", 256).unwrap();
        assert_eq!(&key.expose_secret()[..], &expected[..]);
    }

    #[test]
    fn aad() {
        assert_eq!(envelope_aad("eyJ9", None), b"eyJ9");
        assert_eq!(envelope_aad("eyJ9", Some(b"")), b"eyJ9");
        assert_eq!(envelope_aad("eyJ9", Some(b"extra")), b"eyJ9.extra");
    }
}
