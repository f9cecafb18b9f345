//! Key export and import in a JWK-like shape:
//!
//! - symmetric: `{kid, kty: "oct", alg: "A256GCM", k}`
//! - profile (signing): `{kid, kty: "OKP", crv: "Ed25519", x, d?}`
//! - connect (agreement): `{kid, kty: "OKP", crv: "X25519", x, d?}`
//!
//! `d` is only present on key pairs. Importing checks the type markers and
//! the key lengths.

use crate::{
    crypto::{
        base::{ConnectKeyPair, ConnectPublicKey, ProfileKeyPair, ProfilePublicKey, SymmetricKeySpec},
        ENC_A256GCM,
    },
    error::{Error, Result},
    util::{json::ObjectExt, ser},
};
use serde_json::{json, Map, Value};

const KTY_OCT: &str = "oct";
const KTY_OKP: &str = "OKP";
const CRV_ED25519: &str = "Ed25519";
const CRV_X25519: &str = "X25519";

/// Anything that can be exported to (and imported from) a JWK-like object.
pub trait JsonWebKey: Sized {
    fn to_jwk(&self) -> Value;
    fn from_jwk(jwk: &Value) -> Result<Self>;
}

fn as_object(jwk: &Value) -> Result<&Map<String, Value>> {
    jwk.as_object().ok_or_else(|| Error::JsonWrongType("<jwk>".into()))
}

fn expect_member(jwk: &Map<String, Value>, key: &str, expected: &str) -> Result<()> {
    let val = jwk.req_str(key)?;
    if val != expected {
        Err(Error::KeyTypeMismatch(format!("expected {} {}, got {}", key, expected, val)))?;
    }
    Ok(())
}

/// Check the OKP markers and hand back the object.
fn okp<'a>(jwk: &'a Value, crv: &str) -> Result<&'a Map<String, Value>> {
    let obj = as_object(jwk)?;
    expect_member(obj, "kty", KTY_OKP)?;
    expect_member(obj, "crv", crv)?;
    Ok(obj)
}

fn okp_jwk(kid: &str, crv: &str, x: &[u8], d: Option<&[u8]>) -> Value {
    let mut jwk = json!({
        "kid": kid,
        "kty": KTY_OKP,
        "crv": crv,
        "x": ser::base64_encode(x),
    });
    if let (Some(d), Some(obj)) = (d, jwk.as_object_mut()) {
        obj.insert("d".into(), Value::String(ser::base64_encode(d)));
    }
    jwk
}

impl JsonWebKey for SymmetricKeySpec {
    fn to_jwk(&self) -> Value {
        json!({
            "kid": self.key_id(),
            "kty": KTY_OCT,
            "alg": ENC_A256GCM,
            "k": ser::base64_encode(self.key().expose_secret()),
        })
    }

    fn from_jwk(jwk: &Value) -> Result<Self> {
        let obj = as_object(jwk)?;
        expect_member(obj, "kty", KTY_OCT)?;
        expect_member(obj, "alg", ENC_A256GCM)?;
        let k = zeroize::Zeroizing::new(obj.req_b64("k")?);
        Self::new(obj.req_str("kid")?, &k)
    }
}

impl JsonWebKey for ProfileKeyPair {
    fn to_jwk(&self) -> Value {
        okp_jwk(self.key_id(), CRV_ED25519, self.public().as_ref(), Some(self.expose_secret()))
    }

    fn from_jwk(jwk: &Value) -> Result<Self> {
        let obj = okp(jwk, CRV_ED25519)?;
        let d = zeroize::Zeroizing::new(obj.req_b64("d")?);
        Self::new(obj.req_str("kid")?, &d, &obj.req_b64("x")?)
    }
}

impl JsonWebKey for ProfilePublicKey {
    fn to_jwk(&self) -> Value {
        okp_jwk(self.key_id(), CRV_ED25519, self.public().as_ref(), None)
    }

    fn from_jwk(jwk: &Value) -> Result<Self> {
        let obj = okp(jwk, CRV_ED25519)?;
        Self::new(obj.req_str("kid")?, &obj.req_b64("x")?)
    }
}

impl JsonWebKey for ConnectKeyPair {
    fn to_jwk(&self) -> Value {
        okp_jwk(self.key_id(), CRV_X25519, self.public().as_ref(), Some(self.expose_secret()))
    }

    fn from_jwk(jwk: &Value) -> Result<Self> {
        let obj = okp(jwk, CRV_X25519)?;
        let d = zeroize::Zeroizing::new(obj.req_b64("d")?);
        Self::new(obj.req_str("kid")?, &d, &obj.req_b64("x")?)
    }
}

impl JsonWebKey for ConnectPublicKey {
    fn to_jwk(&self) -> Value {
        okp_jwk(self.key_id(), CRV_X25519, self.public().as_ref(), None)
    }

    fn from_jwk(jwk: &Value) -> Result<Self> {
        let obj = okp(jwk, CRV_X25519)?;
        Self::new(obj.req_str("kid")?, &obj.req_b64("x")?)
    }
}
