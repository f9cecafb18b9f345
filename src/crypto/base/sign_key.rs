use crate::{
    crypto::base::{generate_random_key_id, KeyIdSize},
    error::{Error, Result},
    util::ser::{Binary, BinarySecret},
};
use rand::{CryptoRng, RngCore};
use std::ops::Deref;

/// An Ed25519 signature.
pub type ProfileSignature = Binary<64>;

/// An Ed25519 key pair used to sign profile objects.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct ProfileKeyPair {
    key_id: String,
    #[getset(skip)]
    secret: BinarySecret<32>,
    public: Binary<32>,
}

impl ProfileKeyPair {
    /// Create a key pair from raw secret (RFC 8032 seed) and public key
    /// bytes. Both must be exactly 32 bytes.
    pub fn new<S: Into<String>>(key_id: S, secret: &[u8], public: &[u8]) -> Result<Self> {
        Ok(Self {
            key_id: key_id.into(),
            secret: BinarySecret::try_from(secret)?,
            public: public_from_slice(public)?,
        })
    }

    /// Create a key pair from a seed, deriving the public half.
    pub fn from_seed<S: Into<String>>(key_id: S, seed: [u8; 32]) -> Self {
        let signing = ed25519_consensus::SigningKey::from(seed);
        Self {
            key_id: key_id.into(),
            secret: BinarySecret::new(seed),
            public: Binary::new(signing.verification_key().to_bytes()),
        }
    }

    /// Create a new random key pair with a random (long) key id.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let key_id = generate_random_key_id(rng, KeyIdSize::Long);
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let keypair = Self::from_seed(key_id, seed);
        zeroize::Zeroize::zeroize(&mut seed);
        keypair
    }

    pub fn expose_secret(&self) -> &[u8; 32] {
        self.secret.expose_secret()
    }

    /// Pull out the public half as its own value.
    pub fn public_key(&self) -> ProfilePublicKey {
        ProfilePublicKey {
            key_id: self.key_id.clone(),
            public: self.public,
        }
    }

    /// Sign some bytes.
    pub fn sign(&self, data: &[u8]) -> ProfileSignature {
        let signing = ed25519_consensus::SigningKey::from(*self.secret.expose_secret());
        Binary::new(signing.sign(data).to_bytes())
    }
}

/// The public half of a [`ProfileKeyPair`].
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct ProfilePublicKey {
    key_id: String,
    public: Binary<32>,
}

impl ProfilePublicKey {
    /// Create a public key from raw bytes, which must be exactly 32 bytes.
    pub fn new<S: Into<String>>(key_id: S, public: &[u8]) -> Result<Self> {
        Ok(Self {
            key_id: key_id.into(),
            public: public_from_slice(public)?,
        })
    }

    /// Verify a detached signature over `data`.
    pub fn verify(&self, signature: &ProfileSignature, data: &[u8]) -> Result<()> {
        let pubkey = ed25519_consensus::VerificationKey::try_from(*self.public.deref())
            .map_err(|_| Error::CryptoSignatureVerificationFailed)?;
        let sig = ed25519_consensus::Signature::from(*signature.deref());
        pubkey
            .verify(&sig, data)
            .map_err(|_| Error::CryptoSignatureVerificationFailed)
    }
}

fn public_from_slice(public: &[u8]) -> Result<Binary<32>> {
    Binary::try_from(public).map_err(|_| Error::KeyLength {
        expected: 32,
        got: public.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ser;

    fn seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        for (i, b) in seed.iter_mut().enumerate() {
            *b = i as u8;
        }
        seed
    }

    #[test]
    fn derives_public_from_seed() {
        let keypair = ProfileKeyPair::from_seed("tom", seed());
        assert_eq!(ser::base64_encode(keypair.public()), "A6EHv_POEL4dcN0Y50vAmWfk1jCbpQ1fHdyGZBJVMbg");
    }

    #[test]
    fn sign_verify() {
        let mut rng = crate::util::test::rng();
        let keypair = ProfileKeyPair::generate(&mut rng);
        let sig = keypair.sign(b"i will, i will, i will, i will, i will do your bidding");
        let public = keypair.public_key();
        assert_eq!(public.key_id(), keypair.key_id());
        public.verify(&sig, b"i will, i will, i will, i will, i will do your bidding").unwrap();
        assert_eq!(public.verify(&sig, b"lol"), Err(Error::CryptoSignatureVerificationFailed));

        let other = ProfileKeyPair::generate(&mut rng).public_key();
        assert!(other.verify(&sig, b"i will, i will, i will, i will, i will do your bidding").is_err());
    }

    #[test]
    fn length_invariants() {
        assert_eq!(
            ProfileKeyPair::new("x", &[0u8; 31], &[0u8; 32]).err(),
            Some(Error::KeyLength { expected: 32, got: 31 })
        );
        assert_eq!(
            ProfileKeyPair::new("x", &[0u8; 32], &[0u8; 33]).err(),
            Some(Error::KeyLength { expected: 32, got: 33 })
        );
        assert!(ProfilePublicKey::new("x", &[]).is_err());
        let keypair = ProfileKeyPair::from_seed("x", seed());
        let rebuilt = ProfileKeyPair::new("x", keypair.expose_secret(), keypair.public().as_ref()).unwrap();
        assert_eq!(rebuilt, keypair);
    }

    #[test]
    fn public_key_is_a_copy() {
        let keypair = ProfileKeyPair::from_seed("x", seed());
        let public = keypair.public_key();
        drop(keypair);
        assert_eq!(public.key_id(), "x");
    }
}
