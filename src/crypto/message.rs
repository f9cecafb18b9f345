//! JSON envelopes. Two flavors share one shape:
//!
//! ```text
//! {
//!   "ciphertext": b64, "protected": b64({"enc":"A256GCM"}), "aad"?: b64,
//!   "unprotected": {"alg": ...}, "tag": b64, "iv": b64,
//!   "recipients": [...]
//! }
//! ```
//!
//! - `A256GCMKW`: the payload is encrypted under a random content key (CEK),
//!   and each recipient gets a copy of the CEK wrapped under their own
//!   symmetric key: `{"header":{"kid","iv","tag"},"encrypted_key"}`.
//! - `ECDH-ES`: exactly one recipient, and the CEK is derived from an X25519
//!   agreement between an ephemeral key and the recipient's connect key:
//!   `{"header":{"kid","epk"}}`.
//!
//! The payload AAD is the `protected` field as ASCII, plus `.` and the
//! decoded `aad` member when one is present.

use crate::{
    crypto::{
        base::{concat_kdf, ConnectKeyPair, ConnectPublicKey, DataWithAAD, Sealed, SymmetricKey, SymmetricKeySpec},
        envelope_aad,
        jwk::JsonWebKey,
        KeyProvider, A256GCM_KEY_SIZE, ALG_A256GCMKW, ALG_ECDH_ES, ENC_A256GCM,
    },
    error::{Error, Result},
    util::{
        json::{self, ObjectExt},
        ser,
    },
};
use rand::{CryptoRng, RngCore};
use serde_derive::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// The protected header, byte for byte. We never emit anything else.
const PROTECTED_HEADER: &str = r#"{"enc":"A256GCM"}"#;

#[derive(Serialize)]
struct Unprotected {
    alg: &'static str,
}

/// Field order here is the field order on the wire.
#[derive(Serialize)]
struct JsonEnvelope<R: serde::Serialize> {
    ciphertext: String,
    protected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    aad: Option<String>,
    unprotected: Unprotected,
    tag: String,
    iv: String,
    recipients: Vec<R>,
}

#[derive(Serialize)]
struct WrappedKeyHeader {
    kid: String,
    iv: String,
    tag: String,
}

#[derive(Serialize)]
struct WrappedKeyRecipient {
    header: WrappedKeyHeader,
    encrypted_key: String,
}

#[derive(Serialize)]
struct AgreementHeader {
    kid: String,
    epk: Value,
}

#[derive(Serialize)]
struct AgreementRecipient {
    header: AgreementHeader,
}

/// Encrypt the payload under the CEK and wrap it all up with the given
/// recipients.
fn seal_envelope<R: RngCore + CryptoRng, T: serde::Serialize>(
    rng: &mut R,
    cek: &SymmetricKey,
    payload: &[u8],
    extra_aad: Option<&[u8]>,
    alg: &'static str,
    recipients: Vec<T>,
) -> Result<String> {
    let protected = ser::base64_encode(PROTECTED_HEADER);
    let extra_aad = extra_aad.filter(|x| !x.is_empty());
    let aad = envelope_aad(&protected, extra_aad);
    let sealed = cek.seal(rng, DataWithAAD::new(payload, &aad))?;
    let envelope = JsonEnvelope {
        ciphertext: ser::base64_encode(sealed.ciphertext()),
        protected,
        aad: extra_aad.map(ser::base64_encode),
        unprotected: Unprotected { alg },
        tag: ser::base64_encode(sealed.tag()),
        iv: ser::base64_encode(sealed.iv()),
        recipients,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse an envelope and check its algorithm markers. Returns the envelope
/// object and the decoded protected header.
fn open_envelope(envelope: &str, expected_alg: &str) -> Result<(Map<String, Value>, String)> {
    let obj = json::parse_object(envelope)?;
    let alg = obj.req_object("unprotected")?.req_str("alg")?;
    if alg != expected_alg {
        Err(Error::UnsupportedAlgorithm(alg.into()))?;
    }
    let protected_json = String::from_utf8(obj.req_b64("protected")?)?;
    let enc = json::parse_object(&protected_json)?.req_str("enc")?.to_string();
    if enc != ENC_A256GCM {
        Err(Error::UnsupportedAlgorithm(enc))?;
    }
    Ok((obj, protected_json))
}

/// Decrypt the payload once we have the CEK.
fn open_payload(obj: &Map<String, Value>, protected_json: &str, cek: &SymmetricKey) -> Result<Vec<u8>> {
    let extra_aad = match obj.opt_str("aad")? {
        Some(encoded) => Some(ser::base64_decode(encoded)?),
        None => None,
    };
    let iv = obj.req_b64("iv")?;
    let ciphertext = obj.req_b64("ciphertext")?;
    let tag = obj.req_b64("tag")?;
    let sealed = Sealed::from_parts(&iv, ciphertext, &tag)?;
    let aad = envelope_aad(&ser::base64_encode(protected_json), extra_aad.as_deref());
    cek.open(&sealed, &aad)
}

/// What a single entry in `recipients` amounts to for us.
#[derive(Debug)]
enum RecipientOutcome {
    /// We had the key and it unwrapped the CEK.
    Found(SymmetricKey),
    /// Well-formed, but not for any key we have.
    NotFound(String),
    /// Not a recipient entry we can make sense of.
    Malformed(Error),
}

struct WrappedRecipient {
    kid: String,
    wrapped: Sealed,
}

fn parse_wrapped_recipient(entry: &Value) -> Result<WrappedRecipient> {
    let entry = entry.as_object().ok_or_else(|| Error::JsonWrongType("recipients[]".into()))?;
    let header = entry.req_object("header")?;
    let kid = header.req_str("kid")?.to_string();
    let iv = header.req_b64("iv")?;
    let tag = header.req_b64("tag")?;
    let encrypted_key = entry.req_b64("encrypted_key")?;
    Ok(WrappedRecipient {
        kid,
        wrapped: Sealed::from_parts(&iv, encrypted_key, &tag)?,
    })
}

/// Try one recipient. Failing to unwrap with a key we DO have is fatal: it
/// means the envelope has been tampered with, or our key is wrong.
fn try_recipient<K: KeyProvider + ?Sized>(entry: &Value, keys: &K) -> Result<RecipientOutcome> {
    let recipient = match parse_wrapped_recipient(entry) {
        Ok(x) => x,
        Err(e) => return Ok(RecipientOutcome::Malformed(e)),
    };
    let kek = match keys.get_key(&recipient.kid) {
        Ok(kek) => kek,
        Err(e) if e.is_no_such_key() => return Ok(RecipientOutcome::NotFound(recipient.kid)),
        Err(e) => return Err(e),
    };
    Ok(RecipientOutcome::Found(kek.unwrap_key(&recipient.wrapped)?))
}

/// Encrypt a payload to any number of symmetric keys. If `extra_aad` is
/// given (and not empty) it's authenticated along with the payload and
/// carried in the envelope's `aad` member.
pub fn encrypt_symmetric_json<R: RngCore + CryptoRng>(
    rng: &mut R,
    payload: &[u8],
    recipient_keys: &[SymmetricKeySpec],
    extra_aad: Option<&[u8]>,
) -> Result<String> {
    if recipient_keys.is_empty() {
        Err(Error::EnvelopeMalformed("at least one recipient is required"))?;
    }
    let cek = SymmetricKey::generate(rng);
    let mut recipients = Vec::with_capacity(recipient_keys.len());
    for spec in recipient_keys {
        let wrapped = spec.key().wrap_key(rng, &cek)?;
        recipients.push(WrappedKeyRecipient {
            header: WrappedKeyHeader {
                kid: spec.key_id().clone(),
                iv: ser::base64_encode(wrapped.iv()),
                tag: ser::base64_encode(wrapped.tag()),
            },
            encrypted_key: ser::base64_encode(wrapped.ciphertext()),
        });
    }
    seal_envelope(rng, &cek, payload, extra_aad, ALG_A256GCMKW, recipients)
}

/// Decrypt a multi-recipient envelope. Recipients are tried in order, and
/// ones we have no key for (or can't parse) are skipped. If none of them
/// pan out, this fails with [`Error::NoSuchKey`].
pub fn decrypt_symmetric_json<K: KeyProvider + ?Sized>(envelope: &str, keys: &K) -> Result<Vec<u8>> {
    let (obj, protected_json) = open_envelope(envelope, ALG_A256GCMKW)?;
    let mut tried = Vec::new();
    let mut cek = None;
    for (idx, entry) in obj.req_array("recipients")?.iter().enumerate() {
        match try_recipient(entry, keys)? {
            RecipientOutcome::Found(key) => {
                trace!(recipient = idx, "decrypt_symmetric_json() -- unwrapped cek");
                cek = Some(key);
                break;
            }
            RecipientOutcome::NotFound(kid) => {
                trace!(recipient = idx, kid = %kid, "decrypt_symmetric_json() -- no key, skipping");
                tried.push(kid);
            }
            RecipientOutcome::Malformed(err) => {
                debug!(recipient = idx, error = %err, "decrypt_symmetric_json() -- malformed recipient, skipping");
            }
        }
    }
    let cek = cek.ok_or_else(|| Error::NoSuchKey(tried.join(",")))?;
    open_payload(&obj, &protected_json, &cek)
}

fn derive_agreement_cek(ours: &ConnectKeyPair, theirs: &ConnectPublicKey) -> Result<SymmetricKey> {
    let z = ours.agree(theirs)?;
    let cek = concat_kdf(z.expose_secret(), ENC_A256GCM, &[], &[], A256GCM_KEY_SIZE * 8)?;
    SymmetricKey::from_slice(&cek)
}

/// Encrypt a payload to a single connect public key (ECDH-ES).
pub fn encrypt_asymmetric_json<R: RngCore + CryptoRng>(rng: &mut R, payload: &[u8], recipient_key: &ConnectPublicKey) -> Result<String> {
    let ephemeral = ConnectKeyPair::generate(rng);
    let cek = derive_agreement_cek(&ephemeral, recipient_key)?;
    let recipient = AgreementRecipient {
        header: AgreementHeader {
            kid: recipient_key.key_id().clone(),
            epk: ephemeral.public_key().to_jwk(),
        },
    };
    seal_envelope(rng, &cek, payload, None, ALG_ECDH_ES, vec![recipient])
}

/// Decrypt an ECDH-ES envelope with our connect key pair. Fails with
/// [`Error::NoSuchKey`] if it was addressed to a different key.
pub fn decrypt_asymmetric_json(envelope: &str, keypair: &ConnectKeyPair) -> Result<Vec<u8>> {
    let (obj, protected_json) = open_envelope(envelope, ALG_ECDH_ES)?;
    let recipients = obj.req_array("recipients")?;
    if recipients.len() != 1 {
        Err(Error::EnvelopeMalformed("ECDH-ES supports exactly one recipient"))?;
    }
    let header = recipients[0]
        .as_object()
        .ok_or_else(|| Error::JsonWrongType("recipients[0]".into()))?
        .req_object("header")?;
    let kid = header.req_str("kid")?;
    let epk = header.req("epk")?;
    if kid != keypair.key_id() {
        Err(Error::NoSuchKey(kid.into()))?;
    }
    let ephemeral = ConnectPublicKey::from_jwk(epk)?;
    let cek = derive_agreement_cek(keypair, &ephemeral)?;
    open_payload(&obj, &protected_json, &cek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const MSG: &[u8] = b"hi, it's me, your friendly neighborhood envelope";

    fn keys(rng: &mut rand_chacha::ChaCha20Rng) -> (SymmetricKeySpec, SymmetricKeySpec) {
        (SymmetricKeySpec::generate(rng, "k1"), SymmetricKeySpec::generate(rng, "k2"))
    }

    fn mutate(envelope: &str, f: impl FnOnce(&mut Map<String, Value>)) -> String {
        let mut obj = json::parse_object(envelope).unwrap();
        f(&mut obj);
        Value::Object(obj).to_string()
    }

    #[test]
    fn symmetric_shape() {
        let mut rng = crate::util::test::rng();
        let (k1, k2) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1, k2], None).unwrap();
        assert!(envelope.starts_with(r#"{"ciphertext":"#));
        let obj = json::parse_object(&envelope).unwrap();
        assert_eq!(obj.req_str("protected").unwrap(), "eyJlbmMiOiJBMjU2R0NNIn0");
        assert_eq!(obj["unprotected"], json!({"alg": "A256GCMKW"}));
        assert!(obj.get("aad").is_none());
        let recipients = obj.req_array("recipients").unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0]["header"]["kid"], "k1");
        assert_eq!(recipients[1]["header"]["kid"], "k2");
        assert_ne!(recipients[0]["encrypted_key"], recipients[1]["encrypted_key"]);
    }

    #[test]
    fn symmetric_any_recipient_works() {
        let mut rng = crate::util::test::rng();
        let (k1, k2) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1.clone(), k2.clone()], None).unwrap();
        assert_eq!(decrypt_symmetric_json(&envelope, &k1).unwrap(), MSG);
        assert_eq!(decrypt_symmetric_json(&envelope, &k2).unwrap(), MSG);
        let mut map = HashMap::new();
        map.insert("k2".to_string(), k2.key().clone());
        assert_eq!(decrypt_symmetric_json(&envelope, &map).unwrap(), MSG);
    }

    #[test]
    fn symmetric_no_usable_key() {
        let mut rng = crate::util::test::rng();
        let (k1, k2) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1, k2], None).unwrap();
        let k3 = SymmetricKeySpec::generate(&mut rng, "k3");
        let res = decrypt_symmetric_json(&envelope, &k3);
        assert_eq!(res, Err(Error::NoSuchKey("k1,k2".into())));
    }

    #[test]
    fn symmetric_wrong_key_same_id_is_fatal() {
        let mut rng = crate::util::test::rng();
        let (k1, k2) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1, k2.clone()], None).unwrap();
        // we hold the right k2, but a bogus k1 which is tried first
        let bogus_k1 = SymmetricKeySpec::generate(&mut rng, "k1");
        let res = decrypt_symmetric_json(&envelope, &vec![bogus_k1, k2]);
        assert_eq!(res, Err(Error::CryptoOpenFailed));
    }

    #[test]
    fn symmetric_skips_malformed_recipients() {
        let mut rng = crate::util::test::rng();
        let (k1, k2) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1, k2.clone()], None).unwrap();
        let envelope = mutate(&envelope, |obj| {
            let recipients = obj.get_mut("recipients").unwrap().as_array_mut().unwrap();
            recipients[0] = json!("not even an object");
            recipients.insert(1, json!({"header": {"kid": "k2"}}));
        });
        assert_eq!(decrypt_symmetric_json(&envelope, &k2).unwrap(), MSG);
    }

    #[test]
    fn symmetric_extra_aad() {
        let mut rng = crate::util::test::rng();
        let (k1, _) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1.clone()], Some(b"profile:42")).unwrap();
        let obj = json::parse_object(&envelope).unwrap();
        assert_eq!(obj.req_str("aad").unwrap(), ser::base64_encode("profile:42"));
        assert_eq!(decrypt_symmetric_json(&envelope, &k1).unwrap(), MSG);

        let swapped = mutate(&envelope, |obj| {
            obj.insert("aad".into(), json!(ser::base64_encode("profile:43")));
        });
        assert_eq!(decrypt_symmetric_json(&swapped, &k1), Err(Error::CryptoOpenFailed));
        let dropped = mutate(&envelope, |obj| {
            obj.remove("aad");
        });
        assert_eq!(decrypt_symmetric_json(&dropped, &k1), Err(Error::CryptoOpenFailed));

        // empty extra aad is the same as none
        let none = encrypt_symmetric_json(&mut rng, MSG, &[k1.clone()], Some(b"")).unwrap();
        assert!(json::parse_object(&none).unwrap().get("aad").is_none());
    }

    #[test]
    fn symmetric_header_checks() {
        let mut rng = crate::util::test::rng();
        let (k1, _) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1.clone()], None).unwrap();

        let kw = mutate(&envelope, |obj| {
            obj.insert("unprotected".into(), json!({"alg": "ECDH-ES"}));
        });
        assert_eq!(decrypt_symmetric_json(&kw, &k1), Err(Error::UnsupportedAlgorithm("ECDH-ES".into())));
        let enc = mutate(&envelope, |obj| {
            obj.insert("protected".into(), json!(ser::base64_encode(r#"{"enc":"A128GCM"}"#)));
        });
        assert_eq!(decrypt_symmetric_json(&enc, &k1), Err(Error::UnsupportedAlgorithm("A128GCM".into())));
        let no_recipients = mutate(&envelope, |obj| {
            obj.remove("recipients");
        });
        assert_eq!(
            decrypt_symmetric_json(&no_recipients, &k1),
            Err(Error::JsonMissingField("recipients".into()))
        );
        assert!(matches!(decrypt_symmetric_json("[]", &k1), Err(Error::JsonWrongType(_))));
        assert!(encrypt_symmetric_json(&mut rng, MSG, &[], None).is_err());
    }

    #[test]
    fn symmetric_tamper() {
        let mut rng = crate::util::test::rng();
        let (k1, _) = keys(&mut rng);
        let envelope = encrypt_symmetric_json(&mut rng, MSG, &[k1.clone()], None).unwrap();
        for field in ["iv", "ciphertext", "tag"] {
            let tampered = mutate(&envelope, |obj| {
                let mut bytes = obj.req_b64(field).unwrap();
                bytes[2] ^= 0x04;
                obj.insert(field.into(), json!(ser::base64_encode(&bytes)));
            });
            assert_eq!(decrypt_symmetric_json(&tampered, &k1), Err(Error::CryptoOpenFailed), "{}", field);
        }
        let wrapped = mutate(&envelope, |obj| {
            let recipient = &mut obj.get_mut("recipients").unwrap()[0];
            let mut bytes = ser::base64_decode(recipient["encrypted_key"].as_str().unwrap()).unwrap();
            bytes[0] ^= 0x80;
            recipient["encrypted_key"] = json!(ser::base64_encode(&bytes));
        });
        assert_eq!(decrypt_symmetric_json(&wrapped, &k1), Err(Error::CryptoOpenFailed));
    }

    #[test]
    fn asymmetric_roundtrip() {
        let mut rng = crate::util::test::rng();
        let bob = ConnectKeyPair::generate(&mut rng);
        let envelope = encrypt_asymmetric_json(&mut rng, MSG, &bob.public_key()).unwrap();
        let obj = json::parse_object(&envelope).unwrap();
        assert_eq!(obj["unprotected"], json!({"alg": "ECDH-ES"}));
        let recipients = obj.req_array("recipients").unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(&recipients[0]["header"]["kid"], bob.key_id().as_str());
        assert_eq!(recipients[0]["header"]["epk"]["crv"], "X25519");
        assert!(recipients[0]["header"]["epk"].get("d").is_none());
        assert!(recipients[0].get("encrypted_key").is_none());
        assert_eq!(decrypt_asymmetric_json(&envelope, &bob).unwrap(), MSG);
    }

    #[test]
    fn asymmetric_wrong_recipient() {
        let mut rng = crate::util::test::rng();
        let bob = ConnectKeyPair::generate(&mut rng);
        let envelope = encrypt_asymmetric_json(&mut rng, MSG, &bob.public_key()).unwrap();

        let eve = ConnectKeyPair::generate(&mut rng);
        assert_eq!(decrypt_asymmetric_json(&envelope, &eve), Err(Error::NoSuchKey(bob.key_id().clone())));

        // eve pretending to be bob by key id still can't read it
        let eve_as_bob = ConnectKeyPair::new(bob.key_id().as_str(), eve.expose_secret(), eve.public().as_ref()).unwrap();
        assert_eq!(decrypt_asymmetric_json(&envelope, &eve_as_bob), Err(Error::CryptoOpenFailed));
    }

    #[test]
    fn asymmetric_single_recipient_only() {
        let mut rng = crate::util::test::rng();
        let bob = ConnectKeyPair::generate(&mut rng);
        let envelope = encrypt_asymmetric_json(&mut rng, MSG, &bob.public_key()).unwrap();
        let doubled = mutate(&envelope, |obj| {
            let recipients = obj.get_mut("recipients").unwrap().as_array_mut().unwrap();
            let copy = recipients[0].clone();
            recipients.push(copy);
        });
        assert!(matches!(decrypt_asymmetric_json(&doubled, &bob), Err(Error::EnvelopeMalformed(_))));
        let none = mutate(&envelope, |obj| {
            obj.insert("recipients".into(), json!([]));
        });
        assert!(matches!(decrypt_asymmetric_json(&none, &bob), Err(Error::EnvelopeMalformed(_))));
        // and a symmetric decryptor won't touch it
        let k = SymmetricKeySpec::generate(&mut rng, bob.key_id().as_str());
        assert!(matches!(decrypt_symmetric_json(&envelope, &k), Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn asymmetric_tamper() {
        let mut rng = crate::util::test::rng();
        let bob = ConnectKeyPair::generate(&mut rng);
        let envelope = encrypt_asymmetric_json(&mut rng, MSG, &bob.public_key()).unwrap();
        for field in ["iv", "ciphertext", "tag"] {
            let tampered = mutate(&envelope, |obj| {
                let mut bytes = obj.req_b64(field).unwrap();
                bytes[0] ^= 0x01;
                obj.insert(field.into(), json!(ser::base64_encode(&bytes)));
            });
            assert_eq!(decrypt_asymmetric_json(&tampered, &bob), Err(Error::CryptoOpenFailed), "{}", field);
        }
        let other_epk = mutate(&envelope, |obj| {
            let mut rng = crate::util::test::rng_seeded(99);
            let epk = ConnectKeyPair::generate(&mut rng).public_key().to_jwk();
            obj.get_mut("recipients").unwrap()[0]["header"]["epk"] = epk;
        });
        assert_eq!(decrypt_asymmetric_json(&other_epk, &bob), Err(Error::CryptoOpenFailed));
    }
}
