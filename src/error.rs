//! The main error enum for the project lives here, and documents the various
//! conditions that can arise while building or opening envelopes, deriving
//! keys, and signing objects.
//!
//! Note that signature *verification* does not use this enum for a signature
//! that simply does not check out: that's an expected outcome and is reported
//! as a plain `false`.

use thiserror::Error;

/// This is our error enum. It contains an entry for any part of the system in
/// which an expectation is not met or a problem occurs.
#[derive(Error, Debug)]
pub enum Error {
    /// A signature is being attached to an object that already carries one.
    /// We don't do re-signing.
    #[error("the object is already signed")]
    AlreadySigned,

    /// A fixed-size value (IV, tag, signature) has the wrong length.
    #[error("bad length for {field}: expected {expected} bytes, got {got}")]
    BadLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// Key agreement produced a non-contributory (all-zero) shared secret,
    /// meaning the peer's public key was a low-order point.
    #[error("key agreement failed")]
    CryptoKeyAgreementFailed,

    /// Failed to open a sealed message. Either the key is wrong, or someone
    /// has been messing with the ciphertext, IV, tag, or AAD.
    #[error("failed to open a sealed object")]
    CryptoOpenFailed,

    /// Failed to seal a message.
    #[error("failed to seal an object")]
    CryptoSealFailed,

    /// A signature failed to verify.
    #[error("the given signature/public key/data combo does not verify")]
    CryptoSignatureVerificationFailed,

    /// An error while decoding base64.
    #[error("base64 deserialization error")]
    DeserializeBase64(#[from] base64::DecodeError),

    /// The envelope is structurally broken (wrong number of parts, illegal
    /// member, empty recipient list, and so on).
    #[error("malformed envelope: {0}")]
    EnvelopeMalformed(&'static str),

    /// A decoded header or payload wasn't valid UTF-8.
    #[error("invalid utf8 {0:?}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An IO error while streaming a resource.
    #[error("io error {0:?}")]
    IoError(#[from] std::io::Error),

    /// An error while parsing or producing JSON.
    #[error("json error")]
    Json(#[from] serde_json::Error),

    /// A required JSON member is not present.
    #[error("missing json member `{0}`")]
    JsonMissingField(String),

    /// A JSON member is present but has the wrong type.
    #[error("json member `{0}` has the wrong type")]
    JsonWrongType(String),

    /// Requested derived key length is not a multiple of 8 or exceeds what a
    /// single SHA-256 round can give us.
    #[error("invalid derived key length: {0} bits")]
    KdfBadLength(usize),

    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    KeyLength { expected: usize, got: usize },

    /// A key export describes a different kind of key than the one being
    /// imported.
    #[error("key type mismatch: {0}")]
    KeyTypeMismatch(String),

    /// Requested symmetric key length is not a multiple of 8.
    #[error("invalid key length for generation: {0} bits")]
    KeygenBadLength(usize),

    /// No key is available for the given key id. Kept separate from every
    /// other failure so callers can ask for a different key.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// A delegated (certificate) signature showed up where only the root key
    /// is accepted, i.e. no permissions were asked for.
    #[error("certificate signatures need a set of required permissions")]
    SignatureCertificateNotAllowed,

    /// The certificate chain is longer than the verifier allows.
    #[error("certificate chain exceeds {0} hops")]
    SignatureChainTooDeep(usize),

    /// The object has no `signature` member.
    #[error("the object is not signed")]
    SignatureMissing,

    /// A certificate in the chain does not grant a permission it needs to.
    #[error("certificate does not grant `{0}`")]
    SignaturePermissionMissing(String),

    /// The envelope declares an algorithm or encoding other than the one we
    /// support.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl Error {
    /// Whether this error means "no key for this id" (as opposed to a broken
    /// envelope or a failed authentication check).
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey(_))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // can't derive: std::io::Error and serde_json::Error are not eq-able.
        format!("{:?}", self) == format!("{:?}", other)
    }
}

/// Wraps `std::result::Result` around our `Error` enum
pub type Result<T> = std::result::Result<T, Error>;
