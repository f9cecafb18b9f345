//! Cryptographic plumbing for SPXP, the Social Profile Exchange Protocol.
//!
//! An SPXP profile is a set of JSON documents served over plain HTTP. Anything
//! that shouldn't be world-readable is encrypted to one or more readers, and
//! anything that needs to be trusted is signed, either by the profile's own
//! root key or by a key the profile has delegated to with a certificate.
//!
//! This crate provides:
//!
//! - [canonical JSON][canonical], the byte form that signatures are made over
//! - the legacy and concat [KDFs][crypto::base::legacy_kdf]
//! - envelopes: [compact][crypto::compact] (one symmetric key),
//!   [JSON][crypto::message] (many symmetric keys, or one X25519 key via
//!   ECDH-ES)
//! - [streaming resource encryption][crypto::resource], for media too big to
//!   hold in memory
//! - [signatures][crypto::sign] with certificate chains and permission
//!   checks
//! - [JWK-style key export][crypto::jwk]
//!
//! Everything that needs randomness takes an `rng` argument. See
//! [`rng_chacha20`][crypto::base::rng_chacha20] if you don't have one.
//!
//! ```
//! use spxp_crypto::crypto::{
//!     base::{rng_chacha20, SymmetricKeySpec},
//!     compact::{decrypt_compact, encrypt_compact},
//! };
//!
//! let mut rng = rng_chacha20();
//! let key = SymmetricKeySpec::generate(&mut rng, "friends");
//! let envelope = encrypt_compact(&mut rng, b"see you at the lake", &key).unwrap();
//! assert_eq!(decrypt_compact(&envelope, &key).unwrap(), b"see you at the lake");
//! ```

pub mod canonical;
pub mod crypto;
pub mod error;
pub(crate) mod util;

pub use util::ser::{base64_decode, base64_encode, Binary, BinarySecret};
