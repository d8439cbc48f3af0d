//! Canonical JSON encoding for deterministic signing and hashing.
//!
//! The canonical form of a value is:
//! - Object keys sorted by their UTF-8 bytes
//! - Compact separators (`,` and `:`, no whitespace)
//! - Integers as integers; integral floats collapse to integers
//! - Other floats in shortest round-trip form
//! - Strings escaped as ASCII: `"`, `\`, the short control escapes, and
//!   `\uXXXX` (lowercase hex, surrogate pairs above the BMP) for everything
//!   outside printable ASCII
//!
//! The same logical record always produces the same bytes, whatever order
//! its fields were inserted in. The `signature` field never takes part.

use serde_json::{Map, Number, Value};
use std::fmt::Write as _;

use crate::event::Event;

/// Top-level record field names.
pub(crate) mod keys {
    pub const ID: &str = "id";
    pub const ROOM_ID: &str = "room_id";
    pub const TIMESTAMP_MS: &str = "timestamp_ms";
    pub const SENDER_ID: &str = "sender_id";
    pub const KIND: &str = "kind";
    pub const PARENT_ID: &str = "parent_id";
    pub const PREV_HASH: &str = "prev_hash";
    pub const CONTENT: &str = "content";
    pub const SIGNATURE: &str = "signature";
}

// Largest integer an f64 holds exactly.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

/// Canonical bytes of an event's non-signature fields.
///
/// This is the message that gets signed and the input to the chain hash.
pub fn canonical_bytes(event: &Event) -> Vec<u8> {
    encode_value(&unsigned_value(event))
}

/// The event as a JSON object without its signature.
pub fn unsigned_value(event: &Event) -> Value {
    let mut map = Map::new();
    map.insert(keys::ID.into(), Value::String(event.id().as_str().to_string()));
    map.insert(keys::ROOM_ID.into(), Value::String(event.room_id().to_string()));
    map.insert(keys::TIMESTAMP_MS.into(), Value::from(event.timestamp_ms()));
    map.insert(keys::SENDER_ID.into(), Value::String(event.sender_id().to_string()));
    map.insert(keys::KIND.into(), Value::String(event.kind().as_str().to_string()));
    map.insert(
        keys::PARENT_ID.into(),
        event
            .parent_id()
            .map_or(Value::Null, |id| Value::String(id.as_str().to_string())),
    );
    map.insert(
        keys::PREV_HASH.into(),
        event
            .prev_hash()
            .map_or(Value::Null, |h| Value::String(h.as_str().to_string())),
    );
    map.insert(keys::CONTENT.into(), event.content().to_value());
    Value::Object(map)
}

/// Encode any JSON value canonically.
///
/// A top-level `signature` key is dropped so callers may pass a full wire
/// object.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    match value {
        Value::Object(map) => encode_object(&mut out, map, true),
        other => encode_to(&mut out, other),
    }
    out.into_bytes()
}

fn encode_to(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => encode_number(out, n),
        Value::String(s) => encode_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_to(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => encode_object(out, map, false),
    }
}

fn encode_object(out: &mut String, map: &Map<String, Value>, top_level: bool) {
    let mut entries: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(k, _)| !(top_level && k.as_str() == keys::SIGNATURE))
        .collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_string(out, key);
        out.push(':');
        encode_to(out, value);
    }
    out.push('}');
}

fn encode_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64 {
            let _ = write!(out, "{}", f as i64);
        } else {
            // serde_json prints finite floats in shortest round-trip form.
            out.push_str(&n.to_string());
        }
    }
}

fn encode_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_str(value: Value) -> String {
        String::from_utf8(encode_value(&value)).unwrap()
    }

    #[test]
    fn test_keys_sorted_and_compact() {
        let value = json!({"b": 1, "a": [1, 2, {"d": null, "c": true}]});
        assert_eq!(encode_str(value), r#"{"a":[1,2,{"c":true,"d":null}],"b":1}"#);
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut first = Map::new();
        first.insert("zeta".into(), json!(1));
        first.insert("alpha".into(), json!("x"));
        first.insert("mid".into(), json!({"y": 2, "x": 1}));

        let mut second = Map::new();
        second.insert("mid".into(), json!({"x": 1, "y": 2}));
        second.insert("alpha".into(), json!("x"));
        second.insert("zeta".into(), json!(1));

        assert_eq!(
            encode_value(&Value::Object(first)),
            encode_value(&Value::Object(second))
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(encode_str(json!(1_736_870_400_000i64)), "1736870400000");
        assert_eq!(encode_str(json!(-7)), "-7");
        assert_eq!(encode_str(json!(3.0)), "3");
        assert_eq!(encode_str(json!(1.5)), "1.5");
        assert_eq!(encode_str(json!(0.1)), "0.1");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(encode_str(json!("a\"b\\c")), r#""a\"b\\c""#);
        assert_eq!(encode_str(json!("line\nnext\ttab")), r#""line\nnext\ttab""#);
        assert_eq!(encode_str(json!("\u{01}")), r#""\u0001""#);
        assert_eq!(encode_str(json!("é")), r#""\u00e9""#);
        assert_eq!(encode_str(json!("👍")), r#""\ud83d\udc4d""#);
        assert_eq!(encode_str(json!("\u{7f}")), r#""\u007f""#);
        assert_eq!(encode_str(json!("a/b")), r#""a/b""#);
    }

    #[test]
    fn test_top_level_signature_excluded() {
        let signed = json!({"id": "x", "signature": "abc"});
        let unsigned = json!({"id": "x"});
        assert_eq!(encode_value(&signed), encode_value(&unsigned));

        // Only the record's own signature field is special.
        let nested = json!({"content": {"signature": "abc"}});
        assert_eq!(encode_str(nested), r#"{"content":{"signature":"abc"}}"#);
    }

    #[test]
    fn test_keys_sorted_by_bytes() {
        let value = json!({"b": 1, "B": 2, "_": 3, "a": 4});
        assert_eq!(encode_str(value), r#"{"B":2,"_":3,"a":4,"b":1}"#);
    }

    proptest::proptest! {
        #[test]
        fn test_any_string_encodes_as_ascii_and_parses_back(s in ".*") {
            let bytes = encode_value(&Value::String(s.clone()));
            proptest::prop_assert!(bytes.is_ascii());
            let parsed: String = serde_json::from_slice(&bytes).unwrap();
            proptest::prop_assert_eq!(parsed, s);
        }

        #[test]
        fn test_any_map_encodes_to_equal_json(
            entries in proptest::collection::btree_map(".{0,8}", proptest::num::i64::ANY, 0..8)
        ) {
            proptest::prop_assume!(!entries.contains_key(keys::SIGNATURE));
            let value = Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect(),
            );
            let parsed: Value = serde_json::from_slice(&encode_value(&value)).unwrap();
            proptest::prop_assert_eq!(parsed, value);
        }
    }
}
