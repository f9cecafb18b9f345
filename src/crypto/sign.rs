//! Signed JSON objects.
//!
//! Signing canonicalizes the object (minus a few members that are allowed to
//! change after the fact), signs that with Ed25519, and attaches
//!
//! ```text
//! "signature": {"key": <key id or certificate>, "sig": b64}
//! ```
//!
//! `key` is either the id of the profile's root key, or a certificate: a
//! signed object `{publicKey, grant}` delegating some permissions to another
//! key. Certificates can themselves be signed with certificates, which makes
//! a chain that has to end at the root key. Every hop up the chain needs the
//! permissions being asked for plus the right to delegate them (`grant`, or
//! `ca` if `grant` is what's being delegated).

use crate::{
    canonical::canonicalize_object,
    crypto::{
        base::{ProfileKeyPair, ProfilePublicKey, ProfileSignature},
        jwk::JsonWebKey,
        permission::Permission,
    },
    error::{Error, Result},
    util::{json::ObjectExt, ser},
};
use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};

/// Members left out of the canonical form when signing.
pub const OMIT_MEMBERS_SIGN: &[&str] = &["private", "seqts"];
/// Members left out of the canonical form when verifying: the same as
/// signing, plus the signature itself.
pub const OMIT_MEMBERS_VERIFY: &[&str] = &["private", "seqts", "signature"];
/// How many certificates a chain may have before we give up on it.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

fn attach_signature(object: &mut Map<String, Value>, keypair: &ProfileKeyPair, key: Value) -> Result<()> {
    if object.contains_key("signature") {
        Err(Error::AlreadySigned)?;
    }
    let canonical = canonicalize_object(object, OMIT_MEMBERS_SIGN);
    let sig = keypair.sign(canonical.as_bytes());
    object.insert("signature".into(), json!({ "key": key, "sig": ser::base64_encode(sig) }));
    Ok(())
}

/// Sign an object with a root profile key.
pub fn sign(object: &mut Map<String, Value>, keypair: &ProfileKeyPair) -> Result<()> {
    attach_signature(object, keypair, Value::String(keypair.key_id().clone()))
}

/// Sign an object with a delegated key, embedding the certificate that
/// authorizes it. The certificate must have been issued to `keypair`.
pub fn sign_with_certificate(object: &mut Map<String, Value>, keypair: &ProfileKeyPair, certificate: &Map<String, Value>) -> Result<()> {
    let subject = ProfilePublicKey::from_jwk(certificate.req("publicKey")?)?;
    if subject.public() != keypair.public() {
        Err(Error::KeyTypeMismatch("certificate was issued to a different key".into()))?;
    }
    attach_signature(object, keypair, Value::Object(certificate.clone()))
}

/// Issue a certificate granting `grants` to `subject`, signed by a root key.
/// To issue one from a delegated key, build the same object and sign it with
/// [`sign_with_certificate`].
pub fn issue_certificate(subject: &ProfilePublicKey, grants: &[Permission], issuer: &ProfileKeyPair) -> Result<Map<String, Value>> {
    let mut certificate = certificate_body(subject, grants);
    sign(&mut certificate, issuer)?;
    Ok(certificate)
}

/// The unsigned `{publicKey, grant}` object.
pub fn certificate_body(subject: &ProfilePublicKey, grants: &[Permission]) -> Map<String, Value> {
    let mut certificate = Map::new();
    certificate.insert("publicKey".into(), subject.to_jwk());
    certificate.insert("grant".into(), Value::Array(grants.iter().map(|p| Value::String(p.to_string())).collect()));
    certificate
}

/// What the signer of a certificate needs on top of what the certificate
/// grants.
fn escalate(required: &[Permission]) -> Vec<Permission> {
    let extra = if required.contains(&Permission::GRANT) {
        Permission::CA
    } else {
        Permission::GRANT
    };
    let mut next = required.to_vec();
    if !next.contains(&extra) {
        next.push(extra);
    }
    next
}

fn check_grants(certificate: &Map<String, Value>, required: &[Permission]) -> Result<()> {
    let granted = certificate.req_array("grant")?;
    for perm in required {
        if !granted.iter().any(|g| g.as_str() == Some(perm.as_str())) {
            Err(Error::SignaturePermissionMissing(perm.to_string()))?;
        }
    }
    Ok(())
}

/// Checks signatures against a root key, walking certificate chains up to a
/// fixed depth.
#[derive(Debug, Clone, getset::CopyGetters, getset::Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Verifier {
    /// Maximum number of certificates in a chain. Zero means only the root
    /// key itself is accepted.
    max_chain_depth: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHAIN_DEPTH)
    }
}

impl Verifier {
    pub fn new(max_chain_depth: usize) -> Self {
        Self { max_chain_depth }
    }

    /// Verify a signed object against the profile's root key.
    ///
    /// `required` is the set of permissions a delegated signer must hold. If
    /// it's `None`, only signatures made directly by the root key pass.
    ///
    /// Anything wrong (a bad signature, a missing member, a broken chain)
    /// just gives `false`.
    pub fn verify(&self, object: &Map<String, Value>, root: &ProfilePublicKey, required: Option<&[Permission]>) -> bool {
        match self.check(object, root, required) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Verifier::verify() -- rejected");
                false
            }
        }
    }

    /// Like [`verify`][Verifier::verify], but says why a signature was
    /// rejected.
    pub fn check(&self, object: &Map<String, Value>, root: &ProfilePublicKey, required: Option<&[Permission]>) -> Result<()> {
        // walk down to the root collecting each signed object along with the
        // key that has to have signed it, then check all the signatures.
        let mut hops: Vec<(&Map<String, Value>, ProfileSignature, ProfilePublicKey)> = Vec::new();
        let mut required = required.map(|r| r.to_vec());
        let mut current = object;
        loop {
            let signature = current
                .get("signature")
                .ok_or(Error::SignatureMissing)?
                .as_object()
                .ok_or_else(|| Error::JsonWrongType("signature".into()))?;
            let sig = ProfileSignature::new(ser::base64_decode_fixed("sig", signature.req_str("sig")?)?);
            match signature.req("key")? {
                Value::String(kid) => {
                    if kid != root.key_id() {
                        Err(Error::NoSuchKey(kid.clone()))?;
                    }
                    hops.push((current, sig, root.clone()));
                    break;
                }
                Value::Object(certificate) => {
                    if hops.len() >= self.max_chain_depth {
                        warn!(max = self.max_chain_depth, "Verifier::check() -- certificate chain too deep");
                        Err(Error::SignatureChainTooDeep(self.max_chain_depth))?;
                    }
                    let needed = required.as_deref().ok_or(Error::SignatureCertificateNotAllowed)?;
                    check_grants(certificate, needed)?;
                    let signer = ProfilePublicKey::from_jwk(certificate.req("publicKey")?)?;
                    let escalated = escalate(needed);
                    trace!(hop = hops.len(), signer = %signer.key_id(), "Verifier::check() -- following certificate");
                    hops.push((current, sig, signer));
                    required = Some(escalated);
                    current = certificate;
                }
                _ => Err(Error::JsonWrongType("signature.key".into()))?,
            }
        }
        for (signed, sig, signer) in &hops {
            let canonical = canonicalize_object(signed, OMIT_MEMBERS_VERIFY);
            signer.verify(sig, canonical.as_bytes())?;
        }
        Ok(())
    }
}

/// Verify with the default chain depth. See [`Verifier::verify`].
pub fn verify_signature(object: &Map<String, Value>, root: &ProfilePublicKey, required: Option<&[Permission]>) -> bool {
    Verifier::default().verify(object, root, required)
}
