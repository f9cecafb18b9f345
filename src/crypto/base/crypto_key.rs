use crate::{
    crypto::base::{generate_random_key_id, KeyIdSize},
    error::{Error, Result},
    util::ser::{Binary, BinarySecret},
};
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

/// An X25519 key pair used for key agreement ("connect" keys).
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct ConnectKeyPair {
    key_id: String,
    #[getset(skip)]
    secret: BinarySecret<32>,
    public: Binary<32>,
}

impl ConnectKeyPair {
    /// Create a key pair from raw secret and public key bytes. Both must be
    /// exactly 32 bytes.
    pub fn new<S: Into<String>>(key_id: S, secret: &[u8], public: &[u8]) -> Result<Self> {
        Ok(Self {
            key_id: key_id.into(),
            secret: BinarySecret::try_from(secret)?,
            public: public_from_slice(public)?,
        })
    }

    /// Create a key pair from secret bytes, deriving the public half.
    pub fn from_secret<S: Into<String>>(key_id: S, secret: [u8; 32]) -> Self {
        let public = PublicKey::from(&StaticSecret::from(secret));
        Self {
            key_id: key_id.into(),
            secret: BinarySecret::new(secret),
            public: Binary::new(public.to_bytes()),
        }
    }

    /// Create a new random key pair with a random (long) key id.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let key_id = generate_random_key_id(rng, KeyIdSize::Long);
        Self::generate_with_id(rng, key_id)
    }

    /// Create a new random key pair with the given key id.
    pub fn generate_with_id<R: RngCore + CryptoRng, S: Into<String>>(rng: &mut R, key_id: S) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        let keypair = Self::from_secret(key_id, secret);
        zeroize::Zeroize::zeroize(&mut secret);
        keypair
    }

    pub fn expose_secret(&self) -> &[u8; 32] {
        self.secret.expose_secret()
    }

    /// Pull out the public half as its own value.
    pub fn public_key(&self) -> ConnectPublicKey {
        ConnectPublicKey {
            key_id: self.key_id.clone(),
            public: self.public,
        }
    }

    /// X25519 agreement between our secret and their public key. Fails if the
    /// result is all zeros (their key was a low-order point).
    pub fn agree(&self, their_public: &ConnectPublicKey) -> Result<BinarySecret<32>> {
        let secret = StaticSecret::from(*self.secret.expose_secret());
        let shared = secret.diffie_hellman(&PublicKey::from(**their_public.public()));
        if !shared.was_contributory() {
            Err(Error::CryptoKeyAgreementFailed)?;
        }
        Ok(BinarySecret::new(*shared.as_bytes()))
    }
}

/// The public half of a [`ConnectKeyPair`].
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct ConnectPublicKey {
    key_id: String,
    public: Binary<32>,
}

impl ConnectPublicKey {
    /// Create a public key from raw bytes, which must be exactly 32 bytes.
    pub fn new<S: Into<String>>(key_id: S, public: &[u8]) -> Result<Self> {
        Ok(Self {
            key_id: key_id.into(),
            public: public_from_slice(public)?,
        })
    }
}

fn public_from_slice(public: &[u8]) -> Result<Binary<32>> {
    Binary::try_from(public).map_err(|_| Error::KeyLength {
        expected: 32,
        got: public.len(),
    })
}
