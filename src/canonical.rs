//! Canonical JSON. Signatures are computed over the output of this module, so
//! two parties holding the same JSON value (in any key order, with any
//! whitespace) must produce the exact same bytes.
//!
//! The rules:
//!
//! - object members are sorted by code point, with an optional set of
//!   top-level members left out entirely
//! - strings escape `"`, `\`, the short control escapes, and anything else
//!   below 0x20 as `\u00xx`. Everything else goes out verbatim (no ASCII-only
//!   escaping)
//! - numbers are re-rendered in one canonical form. Integers keep their
//!   exact digits at any size (serde_json's `arbitrary_precision` holds on to
//!   the source text), so a value past the u64 range signs the same here as
//!   it does for a signer that parsed it as a big integer
//! - arrays keep their order
//!
//! There is no whitespace anywhere.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Canonicalize a JSON value. If `value` is an object, any top-level member
/// whose name is in `omit_members` is skipped. Nested objects never omit
/// anything.
pub fn canonicalize(value: &Value, omit_members: &[&str]) -> String {
    let mut out = String::new();
    write_value(&mut out, value, omit_members);
    out
}

/// Canonicalize a JSON object.
pub fn canonicalize_object(object: &Map<String, Value>, omit_members: &[&str]) -> String {
    let mut out = String::new();
    write_object(&mut out, object, omit_members);
    out
}

/// Canonicalize anything serializable. This goes through the generic value
/// tree first, and fails if the value can't be represented as one (map keys
/// that aren't strings, for instance).
pub fn canonicalize_value<T: Serialize>(value: &T, omit_members: &[&str]) -> Result<String> {
    let tree = serde_json::to_value(value)?;
    Ok(canonicalize(&tree, omit_members))
}

fn write_value(out: &mut String, value: &Value, omit_members: &[&str]) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(num) => write_number(out, num),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, &[]);
            }
            out.push(']');
        }
        Value::Object(object) => write_object(out, object, omit_members),
    }
}

fn write_object(out: &mut String, object: &Map<String, Value>, omit_members: &[&str]) {
    let mut keys = object
        .keys()
        .filter(|k| !omit_members.contains(&k.as_str()))
        .collect::<Vec<_>>();
    // str's Ord is byte order, which for utf8 is code point order
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        if let Some(val) = object.get(key) {
            write_value(out, val, &[]);
        }
    }
    out.push('}');
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_number(out: &mut String, num: &Number) {
    let rendered = format_number(num);
    if is_json_number(&rendered) {
        out.push_str(&rendered);
    } else {
        write_string(out, &rendered);
    }
}

/// Integers go out as-is. Floats use the shortest round-trip digits: plain
/// decimal in [1e-3, 1e7), scientific (`1.5E-7`, `1.0E21`) outside of it, and
/// integral values below 1e7 lose their fraction entirely (`2.0` -> `2`).
fn format_number(num: &Number) -> String {
    let text = num.to_string();
    if is_integer_literal(&text) {
        return text;
    }
    let val = match num.as_f64() {
        Some(x) => x,
        None => return num.to_string(),
    };
    if !val.is_finite() {
        return num.to_string();
    }
    let abs = val.abs();
    if val == 0.0 {
        if val.is_sign_negative() {
            "-0".into()
        } else {
            "0".into()
        }
    } else if abs < 1e7 && val.fract() == 0.0 {
        format!("{}", val as i64)
    } else if (1e-3..1e7).contains(&abs) {
        format!("{}", val)
    } else {
        let sci = format!("{:e}", val);
        match sci.split_once('e') {
            Some((mantissa, exp)) if mantissa.contains('.') => format!("{}E{}", mantissa, exp),
            Some((mantissa, exp)) => format!("{}.0E{}", mantissa, exp),
            None => sci,
        }
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Checks the JSON number grammar:
/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(s: &str) -> bool {
    fn digits(b: &[u8], mut i: usize) -> usize {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    }
    let b = s.as_bytes();
    let mut i = 0;
    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    match b.get(i) {
        Some(b'0') => i += 1,
        Some(c) if c.is_ascii_digit() => i = digits(b, i),
        _ => return false,
    }
    if b.get(i) == Some(&b'.') {
        let end = digits(b, i + 1);
        if end == i + 1 {
            return false;
        }
        i = end;
    }
    if matches!(b.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if matches!(b.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let end = digits(b, i);
        if end == i {
            return false;
        }
        i = end;
    }
    i == b.len()
}
