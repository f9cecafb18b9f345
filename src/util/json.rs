//! Typed access into JSON objects. Envelopes and signed objects arrive as
//! generic `serde_json` trees, and every lookup either gets the type it wants
//! or fails with a structural error naming the member.

use crate::{
    error::{Error, Result},
    util::ser,
};
use serde_json::{Map, Value};

pub(crate) trait ObjectExt {
    fn req(&self, key: &str) -> Result<&Value>;
    fn req_str(&self, key: &str) -> Result<&str>;
    fn req_object(&self, key: &str) -> Result<&Map<String, Value>>;
    fn req_array(&self, key: &str) -> Result<&Vec<Value>>;
    fn opt_str(&self, key: &str) -> Result<Option<&str>>;

    /// A required base64url member, decoded.
    fn req_b64(&self, key: &str) -> Result<Vec<u8>> {
        ser::base64_decode(self.req_str(key)?)
    }
}

impl ObjectExt for Map<String, Value> {
    fn req(&self, key: &str) -> Result<&Value> {
        self.get(key).ok_or_else(|| Error::JsonMissingField(key.into()))
    }

    fn req_str(&self, key: &str) -> Result<&str> {
        self.req(key)?.as_str().ok_or_else(|| Error::JsonWrongType(key.into()))
    }

    fn req_object(&self, key: &str) -> Result<&Map<String, Value>> {
        self.req(key)?.as_object().ok_or_else(|| Error::JsonWrongType(key.into()))
    }

    fn req_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.req(key)?.as_array().ok_or_else(|| Error::JsonWrongType(key.into()))
    }

    fn opt_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(Error::JsonWrongType(key.into())),
        }
    }
}

/// Parse a string that must hold a JSON object.
pub(crate) fn parse_object(json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::JsonWrongType("<root>".into())),
    }
}
