//! The crypto base wraps the primitives everything else is built from: the
//! three kinds of key material, the two KDFs, and an AES-256-GCM core that can
//! run over a stream (plus the tail buffer that splits its tag off).
//!
//! Anything that needs randomness takes it as an argument (`rng: &mut R`)
//! rather than reaching for a global. If you don't have one handy,
//! [`rng_chacha20`] gives you a good one.

use crate::{
    error::{Error, Result},
    util::ser,
};
use rand::{rngs::OsRng, CryptoRng, RngCore, SeedableRng};
use zeroize::Zeroizing;

mod crypto_key;
pub(crate) mod gcm;
mod kdf;
mod secret_key;
mod sign_key;
mod tail;

pub use crypto_key::*;
pub use kdf::*;
pub use secret_key::*;
pub use sign_key::*;
pub use tail::TailBuffer;

/// A convenience function that returns a ChaCha20 CSRNG seeded with OS random bytes. Use this if
/// you want a nice, strong random number generator, you don't want to wire one up yourself, and
/// your platform provides good entropy.
///
/// This can be used as an input to any function here that accepts `&mut rng`. Otherwise, you can
/// bring your own RNG that implements [`RngCore`] + [`CryptoRng`].
pub fn rng_chacha20() -> rand_chacha::ChaCha20Rng {
    let mut seed_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut seed_bytes);
    rand_chacha::ChaCha20Rng::from_seed(seed_bytes)
}

/// The two sizes of random key id the protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIdSize {
    /// 48 bits
    Short,
    /// 96 bits. Generated key pairs and symmetric keys get these.
    Long,
}

impl KeyIdSize {
    /// Size in bytes (before base64).
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Short => 6,
            Self::Long => 12,
        }
    }
}

/// Generate a random key id, base64url-encoded.
pub fn generate_random_key_id<R: RngCore + CryptoRng>(rng: &mut R, size: KeyIdSize) -> String {
    let mut randbuf = vec![0u8; size.byte_len()];
    rng.fill_bytes(&mut randbuf);
    ser::base64_encode(&randbuf)
}

/// Generate a key id for a round key: a long id identifying the key group,
/// a dot, then a short id identifying the round.
pub fn generate_round_key_id<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let group = generate_random_key_id(rng, KeyIdSize::Long);
    let round = generate_random_key_id(rng, KeyIdSize::Short);
    format!("{}.{}", group, round)
}

/// Generate random symmetric key bytes of the given bit length.
pub fn generate_symmetric_key<R: RngCore + CryptoRng>(rng: &mut R, bits: usize) -> Result<Zeroizing<Vec<u8>>> {
    if bits % 8 != 0 {
        Err(Error::KeygenBadLength(bits))?;
    }
    let mut randbuf = Zeroizing::new(vec![0u8; bits / 8]);
    rng.fill_bytes(&mut randbuf);
    Ok(randbuf)
}
