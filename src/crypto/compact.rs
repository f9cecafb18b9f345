//! The compact envelope: one recipient, direct symmetric key, five
//! dot-separated base64url fields:
//!
//! ```text
//! header . (empty) . iv . ciphertext . tag
//! ```
//!
//! where the header is `{"alg":"dir","enc":"A256GCM","kid":"..."}` and the
//! AAD is the base64url header field as ASCII bytes (not the raw header JSON).

use crate::{
    crypto::{
        base::{DataWithAAD, Sealed, SymmetricKeySpec},
        envelope_aad, KeyProvider, SharedSecretKeys, ALG_DIR, ENC_A256GCM,
    },
    error::{Error, Result},
    util::{
        json::{self, ObjectExt},
        ser,
    },
};
use rand::{CryptoRng, RngCore};
use serde_derive::Serialize;
use tracing::trace;

/// Field order here is the field order on the wire.
#[derive(Serialize)]
struct CompactHeader<'a> {
    alg: &'static str,
    enc: &'static str,
    kid: &'a str,
}

/// Encrypt a payload to a single symmetric key.
pub fn encrypt_compact<R: RngCore + CryptoRng>(rng: &mut R, payload: &[u8], key: &SymmetricKeySpec) -> Result<String> {
    let header = serde_json::to_string(&CompactHeader {
        alg: ALG_DIR,
        enc: ENC_A256GCM,
        kid: key.key_id(),
    })?;
    let header_b64 = ser::base64_encode(header.as_bytes());
    let aad = envelope_aad(&header_b64, None);
    let sealed = key.key().seal(rng, DataWithAAD::new(payload, &aad))?;
    Ok(format!(
        "{}..{}.{}.{}",
        header_b64,
        ser::base64_encode(sealed.iv()),
        ser::base64_encode(sealed.ciphertext()),
        ser::base64_encode(sealed.tag()),
    ))
}

/// Decrypt a compact envelope, asking `keys` for the key named in the
/// header. Fails with [`Error::NoSuchKey`] if it doesn't have it.
pub fn decrypt_compact<K: KeyProvider + ?Sized>(compact: &str, keys: &K) -> Result<Vec<u8>> {
    let parts = compact.split('.').collect::<Vec<_>>();
    if parts.len() != 5 {
        Err(Error::EnvelopeMalformed("compact envelope must have exactly 5 parts"))?;
    }
    let header_json = String::from_utf8(ser::base64_decode(parts[0])?)?;
    let encrypted_key = ser::base64_decode(parts[1])?;
    let iv = ser::base64_decode(parts[2])?;
    let ciphertext = ser::base64_decode(parts[3])?;
    let tag = ser::base64_decode(parts[4])?;

    let header = json::parse_object(&header_json)?;
    let alg = header.req_str("alg")?;
    let enc = header.req_str("enc")?;
    let kid = header.req_str("kid")?;
    if alg != ALG_DIR || enc != ENC_A256GCM {
        Err(Error::UnsupportedAlgorithm(format!("{}/{}", alg, enc)))?;
    }
    if !encrypted_key.is_empty() {
        Err(Error::EnvelopeMalformed("unexpected encrypted key in compact envelope"))?;
    }
    if header.contains_key("aad") {
        Err(Error::EnvelopeMalformed("unexpected aad in compact header"))?;
    }
    let sealed = Sealed::from_parts(&iv, ciphertext, &tag)?;
    let key = keys.get_key(kid)?;
    trace!(kid = kid, "decrypt_compact() -- opening");
    // AAD is over the re-encoded header, which only differs from parts[0]
    // if the sender padded it
    let aad = envelope_aad(&ser::base64_encode(header_json.as_bytes()), None);
    key.open(&sealed, &aad)
}

/// Legacy group-key exchange: encrypt under a key derived from a shared
/// secret. A random 64-bit key id goes in the header, and the key is
/// `legacy_kdf(shared_secret, kid, 256)`.
pub fn encrypt_with_shared_secret<R: RngCore + CryptoRng>(rng: &mut R, payload: &[u8], shared_secret: &[u8]) -> Result<String> {
    let mut kid_bytes = [0u8; 8];
    rng.fill_bytes(&mut kid_bytes);
    let kid = ser::base64_encode(kid_bytes);
    let key = SymmetricKeySpec::from_key(kid.as_str(), SharedSecretKeys(shared_secret).get_key(&kid)?);
    encrypt_compact(rng, payload, &key)
}

/// Open an envelope made by [`encrypt_with_shared_secret`], deriving the key
/// from the header's key id.
pub fn decrypt_with_shared_secret(compact: &str, shared_secret: &[u8]) -> Result<Vec<u8>> {
    decrypt_compact(compact, &SharedSecretKeys(shared_secret))
}
