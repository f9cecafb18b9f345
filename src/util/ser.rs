//! Helpful serialization tools.
//!
//! Everything binary that crosses the wire in this protocol (keys, IVs, tags,
//! signatures, ciphertext) is base64url without padding, so that's what lives
//! here, along with a couple of fixed-size byte containers that know how to
//! (de)serialize themselves that way.

use crate::error::{Error, Result};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// base64url. We never emit padding, but we'll happily eat it if someone else
/// does.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Convert bytes to base64
pub fn base64_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    BASE64_URL.encode(bytes.as_ref())
}

/// Convert base64 to bytes
pub fn base64_decode<T: AsRef<[u8]>>(bytes: T) -> Result<Vec<u8>> {
    Ok(BASE64_URL.decode(bytes.as_ref())?)
}

/// Decode base64 into a fixed-length array, failing if the length is off.
pub(crate) fn base64_decode_fixed<const N: usize>(field: &'static str, encoded: &str) -> Result<[u8; N]> {
    let bytes = base64_decode(encoded)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| Error::BadLength { field, expected: N, got })
}

/// A fixed-length chunk of public binary data (IV, tag, public key, signature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binary<const N: usize>([u8; N]);

impl<const N: usize> Binary<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self(data)
    }
}

impl<const N: usize> Deref for Binary<N> {
    type Target = [u8; N];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> AsRef<[u8]> for Binary<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> TryFrom<&[u8]> for Binary<N> {
    type Error = Error;
    fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
        let arr: [u8; N] = slice.try_into().map_err(|_| Error::BadLength {
            field: "binary",
            expected: N,
            got: slice.len(),
        })?;
        Ok(Self(arr))
    }
}

impl<const N: usize> Serialize for Binary<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64_encode(self.0))
    }
}

impl<'de, const N: usize> Deserialize<'de> for Binary<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String>::deserialize(deserializer)?;
        let bytes = base64_decode(&s).map_err(de::Error::custom)?;
        Self::try_from(bytes.as_slice()).map_err(de::Error::custom)
    }
}

/// A fixed-length chunk of secret binary data. Zeroed when dropped, and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BinarySecret<const N: usize>([u8; N]);

impl<const N: usize> BinarySecret<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self(data)
    }

    /// Grab the raw secret bytes. Try not to hold onto them.
    pub fn expose_secret(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> std::fmt::Debug for BinarySecret<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BinarySecret<{}>(<redacted>)", N)
    }
}

impl<const N: usize> TryFrom<&[u8]> for BinarySecret<N> {
    type Error = Error;
    fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
        let arr: [u8; N] = slice.try_into().map_err(|_| Error::KeyLength {
            expected: N,
            got: slice.len(),
        })?;
        Ok(Self(arr))
    }
}

impl<const N: usize> Serialize for BinarySecret<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64_encode(self.0))
    }
}

impl<'de, const N: usize> Deserialize<'de> for BinarySecret<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String>::deserialize(deserializer)?;
        let mut bytes = base64_decode(&s).map_err(de::Error::custom)?;
        let res = Self::try_from(bytes.as_slice()).map_err(de::Error::custom);
        bytes.zeroize();
        res
    }
}
