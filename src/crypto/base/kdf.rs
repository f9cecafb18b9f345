//! Key derivation. There are two of these and they are NOT interchangeable:
//! the legacy KDF exists only for shared-secret envelopes, and the concat KDF
//! only for ECDH-ES. Both are a single SHA-256 round, which caps the output at
//! 256 bits.

use crate::{
    crypto::MAX_DERIVED_KEY_BITS,
    error::{Error, Result},
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

fn check_bits(bits: usize) -> Result<()> {
    if bits % 8 != 0 || bits > MAX_DERIVED_KEY_BITS {
        Err(Error::KdfBadLength(bits))?;
    }
    Ok(())
}

/// `SHA256("SPXP-KDF" || shared_secret || utf8(key_id))`, truncated to `bits`.
pub fn legacy_kdf(shared_secret: &[u8], key_id: &str, bits: usize) -> Result<Zeroizing<Vec<u8>>> {
    check_bits(bits)?;
    let mut hasher = Sha256::new();
    hasher.update(b"SPXP-KDF");
    hasher.update(shared_secret);
    hasher.update(key_id.as_bytes());
    let mut digest = hasher.finalize();
    let out = Zeroizing::new(digest[..bits / 8].to_vec());
    zeroize::Zeroize::zeroize(digest.as_mut_slice());
    Ok(out)
}

/// Single-round concat KDF (NIST SP 800-56A, as used by JWA for ECDH-ES):
///
/// ```text
/// SHA256(00000001 || Z || len(alg) || alg || len(apu) || apu || len(apv) || apv || bits)
/// ```
///
/// with every length and `bits` as a 4-byte big-endian integer, truncated to
/// `bits`.
pub fn concat_kdf(z: &[u8], alg: &str, apu: &[u8], apv: &[u8], bits: usize) -> Result<Zeroizing<Vec<u8>>> {
    check_bits(bits)?;
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(z);
    for field in [alg.as_bytes(), apu, apv] {
        hasher.update((field.len() as u32).to_be_bytes());
        hasher.update(field);
    }
    hasher.update((bits as u32).to_be_bytes());
    let mut digest = hasher.finalize();
    let out = Zeroizing::new(digest[..bits / 8].to_vec());
    zeroize::Zeroize::zeroize(digest.as_mut_slice());
    Ok(out)
}
