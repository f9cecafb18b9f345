//! Resource encryption: a stream of any length in, `ciphertext` out (the same
//! length as the input), plus a small descriptor holding the random key, IV,
//! and tag needed to get it back:
//!
//! ```text
//! {"iv": b64, "k": b64, "tag": b64, "uri"?: "..."}
//! ```
//!
//! The descriptor is what gets shared (usually inside some other envelope),
//! the ciphertext goes wherever `uri` says.

use crate::{
    crypto::{
        base::{
            gcm::{GcmDecryptWriter, GcmEncryptWriter},
            SymmetricKey, TailBuffer,
        },
        A256GCM_IV_SIZE, A256GCM_KEY_SIZE, A256GCM_TAG_SIZE,
    },
    error::{Error, Result},
    util::{
        json::{self, ObjectExt},
        ser::{self, Binary, BinarySecret},
    },
};
use getset::Getters;
use rand::{CryptoRng, RngCore};
use serde_derive::Serialize;
use std::io::{self, Read, Write};
use tracing::debug;

/// Everything needed to decrypt a resource. Holds a key, so treat it like one.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
#[getset(get = "pub")]
pub struct ResourceDescriptor {
    iv: Binary<A256GCM_IV_SIZE>,
    #[getset(skip)]
    k: BinarySecret<A256GCM_KEY_SIZE>,
    tag: Binary<A256GCM_TAG_SIZE>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(iv: Binary<A256GCM_IV_SIZE>, key: &SymmetricKey, tag: Binary<A256GCM_TAG_SIZE>, uri: Option<String>) -> Self {
        Self {
            iv,
            k: BinarySecret::new(*key.expose_secret()),
            tag,
            uri,
        }
    }

    /// The content key.
    pub fn key(&self) -> SymmetricKey {
        SymmetricKey::new(*self.k.expose_secret())
    }

    /// Set (or clear) where the ciphertext lives.
    pub fn set_uri(&mut self, uri: Option<String>) {
        self.uri = uri;
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a descriptor, checking the IV, key, and tag lengths.
    pub fn from_json(descriptor: &str) -> Result<Self> {
        let obj = json::parse_object(descriptor)?;
        let iv = ser::base64_decode_fixed::<A256GCM_IV_SIZE>("iv", obj.req_str("iv")?)?;
        let mut k = ser::base64_decode_fixed::<A256GCM_KEY_SIZE>("k", obj.req_str("k")?)?;
        let tag = ser::base64_decode_fixed::<A256GCM_TAG_SIZE>("tag", obj.req_str("tag")?)?;
        let uri = obj.opt_str("uri")?.map(String::from);
        let descriptor = Self {
            iv: Binary::new(iv),
            k: BinarySecret::new(k),
            tag: Binary::new(tag),
            uri,
        };
        zeroize::Zeroize::zeroize(&mut k);
        Ok(descriptor)
    }
}

/// Encrypt everything in `src` into `dest` under a fresh random key and IV.
/// Only the ciphertext goes to `dest`: the tag is split off into the
/// returned descriptor.
pub fn encrypt_resource<R, S, W>(rng: &mut R, mut src: S, dest: W, uri: Option<&str>) -> Result<ResourceDescriptor>
where
    R: RngCore + CryptoRng,
    S: Read,
    W: Write,
{
    let key = SymmetricKey::generate(rng);
    let mut iv = [0u8; A256GCM_IV_SIZE];
    rng.fill_bytes(&mut iv);

    let mut writer = GcmEncryptWriter::new(&key, &iv, TailBuffer::new(dest, A256GCM_TAG_SIZE));
    let written = io::copy(&mut src, &mut writer)?;
    let (mut dest, tag) = writer.finish()?.into_parts();
    dest.flush()?;
    debug!(bytes = written, "encrypt_resource() -- done");

    let tag = Binary::try_from(tag.as_slice()).map_err(|_| Error::CryptoSealFailed)?;
    Ok(ResourceDescriptor::new(Binary::new(iv), &key, tag, uri.map(String::from)))
}

/// Decrypt a resource from `src` into `dest`.
///
/// # Security
///
/// Plaintext is written to `dest` as it's decrypted, before the tag has been
/// checked, so memory use stays flat no matter how big the resource is. This
/// is unlike a buffering AEAD API, which releases nothing until the tag
/// verifies. If this returns an error, whatever landed in `dest` is
/// unauthenticated and must be thrown away.
pub fn decrypt_resource<S, W>(mut src: S, dest: W, descriptor: &ResourceDescriptor) -> Result<()>
where
    S: Read,
    W: Write,
{
    let mut writer = GcmDecryptWriter::new(&descriptor.key(), descriptor.iv(), dest);
    let read = io::copy(&mut src, &mut writer)?;
    writer.write_all(descriptor.tag().as_ref())?;
    writer.finish()?;
    debug!(bytes = read, "decrypt_resource() -- done");
    Ok(())
}
