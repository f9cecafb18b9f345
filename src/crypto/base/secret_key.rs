use crate::{
    crypto::{
        base::{generate_random_key_id, KeyIdSize},
        A256GCM_IV_SIZE, A256GCM_KEY_SIZE, A256GCM_TAG_SIZE,
    },
    error::{Error, Result},
    util::ser::{Binary, BinarySecret},
};
use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm,
};
use rand::{CryptoRng, RngCore};

/// A structure to help with the bundling of AAD (additional associated data) with our plaintext.
#[derive(Debug, Clone, getset::Getters)]
#[getset(get = "pub")]
pub struct DataWithAAD<'msg> {
    data: &'msg [u8],
    aad: &'msg [u8],
}

impl<'msg> DataWithAAD<'msg> {
    /// Create a new data+AAD payload
    pub fn new(data: &'msg [u8], aad: &'msg [u8]) -> Self {
        Self { data, aad }
    }
}

impl<'msg> From<&'msg [u8]> for DataWithAAD<'msg> {
    fn from(data: &'msg [u8]) -> Self {
        Self { data, aad: &[] }
    }
}

impl<'msg> From<&'msg Vec<u8>> for DataWithAAD<'msg> {
    fn from(data: &'msg Vec<u8>) -> Self {
        Self::from(data.as_slice())
    }
}

impl<'msg, const N: usize> From<&'msg [u8; N]> for DataWithAAD<'msg> {
    fn from(data: &'msg [u8; N]) -> Self {
        Self::from(data.as_slice())
    }
}

/// The output of AES-256-GCM with the tag split off from the ciphertext,
/// which is how every envelope in this protocol carries it. The AAD is not
/// stored: envelopes recompute it from their headers.
#[derive(Debug, Clone, PartialEq, getset::Getters, getset::MutGetters, getset::Setters)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct Sealed {
    /// Our heroic IV
    iv: Binary<A256GCM_IV_SIZE>,
    /// The ciphertext, same length as the plaintext
    ciphertext: Vec<u8>,
    /// The authentication tag
    tag: Binary<A256GCM_TAG_SIZE>,
}

impl Sealed {
    pub fn new(iv: Binary<A256GCM_IV_SIZE>, ciphertext: Vec<u8>, tag: Binary<A256GCM_TAG_SIZE>) -> Self {
        Self { iv, ciphertext, tag }
    }

    /// Build from decoded wire parts, checking the fixed lengths.
    pub fn from_parts(iv: &[u8], ciphertext: Vec<u8>, tag: &[u8]) -> Result<Self> {
        let iv = Binary::try_from(iv).map_err(|_| Error::BadLength {
            field: "iv",
            expected: A256GCM_IV_SIZE,
            got: iv.len(),
        })?;
        let tag = Binary::try_from(tag).map_err(|_| Error::BadLength {
            field: "tag",
            expected: A256GCM_TAG_SIZE,
            got: tag.len(),
        })?;
        Ok(Self::new(iv, ciphertext, tag))
    }
}

/// A raw 256-bit AES-GCM key, without an id attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricKey(BinarySecret<A256GCM_KEY_SIZE>);

impl SymmetricKey {
    pub fn new(secret_bytes: [u8; A256GCM_KEY_SIZE]) -> Self {
        Self(BinarySecret::new(secret_bytes))
    }

    /// Create from a byte slice, which must be exactly 32 bytes.
    pub fn from_slice(secret_bytes: &[u8]) -> Result<Self> {
        Ok(Self(BinarySecret::try_from(secret_bytes)?))
    }

    /// Create a new random key
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut randbuf = [0u8; A256GCM_KEY_SIZE];
        rng.fill_bytes(&mut randbuf);
        let key = Self::new(randbuf);
        zeroize::Zeroize::zeroize(&mut randbuf);
        key
    }

    pub fn expose_secret(&self) -> &[u8; A256GCM_KEY_SIZE] {
        self.0.expose_secret()
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(self.expose_secret()))
    }

    /// Encrypt a value under a fresh random IV.
    pub fn seal<'msg, D: Into<DataWithAAD<'msg>>, R: RngCore + CryptoRng>(&self, rng: &mut R, data: D) -> Result<Sealed> {
        let mut iv = [0u8; A256GCM_IV_SIZE];
        rng.fill_bytes(&mut iv);
        self.seal_with_iv(Binary::new(iv), data)
    }

    /// Encrypt a value with a caller-chosen IV. Never reuse an IV with the
    /// same key.
    pub fn seal_with_iv<'msg, D: Into<DataWithAAD<'msg>>>(&self, iv: Binary<A256GCM_IV_SIZE>, data: D) -> Result<Sealed> {
        let DataWithAAD { data, aad } = data.into();
        let mut buf = data.to_vec();
        let tag = self
            .cipher()
            .encrypt_in_place_detached(GenericArray::from_slice(iv.as_ref()), aad, &mut buf)
            .map_err(|_| Error::CryptoSealFailed)?;
        let tag: [u8; A256GCM_TAG_SIZE] = tag.into();
        Ok(Sealed::new(iv, buf, Binary::new(tag)))
    }

    /// Decrypt and authenticate. No plaintext comes out unless the tag checks
    /// out against the ciphertext, IV, and `aad`.
    pub fn open(&self, sealed: &Sealed, aad: &[u8]) -> Result<Vec<u8>> {
        let mut buf = sealed.ciphertext().clone();
        self.cipher()
            .decrypt_in_place_detached(
                GenericArray::from_slice(sealed.iv().as_ref()),
                aad,
                &mut buf,
                GenericArray::from_slice(sealed.tag().as_ref()),
            )
            .map_err(|_| Error::CryptoOpenFailed)?;
        Ok(buf)
    }

    /// Wrap another key under this one (AES-GCM key wrap, no AAD).
    pub fn wrap_key<R: RngCore + CryptoRng>(&self, rng: &mut R, key: &SymmetricKey) -> Result<Sealed> {
        self.seal(rng, key.expose_secret())
    }

    /// Unwrap a key wrapped by [`wrap_key`][SymmetricKey::wrap_key]. Fails if
    /// authentication fails or the unwrapped key isn't 256 bits.
    pub fn unwrap_key(&self, wrapped: &Sealed) -> Result<SymmetricKey> {
        let mut raw = self.open(wrapped, &[])?;
        let res = SymmetricKey::from_slice(&raw);
        zeroize::Zeroize::zeroize(&mut raw);
        res
    }
}

/// A symmetric key with its key id.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct SymmetricKeySpec {
    key_id: String,
    key: SymmetricKey,
}

impl SymmetricKeySpec {
    /// Create a key spec. The key must be exactly 256 bits.
    pub fn new<S: Into<String>>(key_id: S, key: &[u8]) -> Result<Self> {
        Ok(Self {
            key_id: key_id.into(),
            key: SymmetricKey::from_slice(key)?,
        })
    }

    pub fn from_key<S: Into<String>>(key_id: S, key: SymmetricKey) -> Self {
        Self { key_id: key_id.into(), key }
    }

    /// Generate a new random key with the given key id.
    pub fn generate<R: RngCore + CryptoRng, S: Into<String>>(rng: &mut R, key_id: S) -> Self {
        Self::from_key(key_id, SymmetricKey::generate(rng))
    }

    /// Generate a new random key with a random (long) key id.
    pub fn generate_with_random_id<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let key_id = generate_random_key_id(rng, KeyIdSize::Long);
        Self::generate(rng, key_id)
    }
}
