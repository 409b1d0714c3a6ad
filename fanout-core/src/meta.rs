//! Metadata codec for the notification `meta` column.
//!
//! Callers may attach arbitrary metadata to a notification: a scalar, a
//! list, or a keyed structure. The store holds one text column, so
//! structured values are flattened into a legacy tagged serialization
//! format and detected again on the way out by structural sniffing.
//! The format is kept byte-compatible with previously stored data.
//!
//! Decoding is a safety boundary: a malformed or adversarial stored
//! payload never panics or errors out of [`maybe_unserialize`]; it
//! simply fails detection or parsing and passes through as an opaque
//! string.

use serde_json::{Map, Number, Value};

/// In-memory metadata value.
pub type MetaValue = Value;

/// Parser recursion limit for nested containers.
const MAX_DEPTH: usize = 128;

/// Encode metadata into its storable text form.
///
/// Structured values (lists, maps) are always serialized. A string
/// scalar that already looks like serialized data is serialized again,
/// so the decode side unwraps it back to the original string instead of
/// misinterpreting it. Any other scalar passes through as plain text.
pub fn maybe_serialize(data: &MetaValue) -> String {
    match data {
        Value::Array(_) | Value::Object(_) => serialize_value(data),
        Value::String(s) => {
            if is_serialized(s, false) {
                serialize_value(data)
            } else {
                s.clone()
            }
        }
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    }
}

/// Decode a stored `meta` value.
///
/// Input that does not sniff as serialized is returned unchanged as a
/// string. Serialized input that fails to parse (truncated, bad length
/// prefix, unsupported tag) also degrades to the raw string.
pub fn maybe_unserialize(raw: &str) -> MetaValue {
    let trimmed = raw.trim();
    if is_serialized(trimmed, true) {
        if let Some(value) = unserialize(trimmed) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

/// Structural test for the serialized format.
///
/// Strict mode demands a well-formed terminator and is used on the
/// decode path; non-strict mode is the looser check the encode path
/// uses to decide whether a scalar needs protective re-serialization.
pub fn is_serialized(data: &str, strict: bool) -> bool {
    let data = data.trim();
    // The serialized-null literal is shorter than every other form.
    if data == "N;" {
        return true;
    }
    let bytes = data.as_bytes();
    if bytes.len() < 4 {
        return false;
    }
    if bytes[1] != b':' {
        return false;
    }
    if strict {
        let last = bytes[bytes.len() - 1];
        if last != b';' && last != b'}' {
            return false;
        }
    } else {
        let semicolon = data.find(';');
        let brace = data.find('}');
        // Either ; or } must exist, and neither in the first few bytes.
        if semicolon.is_none() && brace.is_none() {
            return false;
        }
        if matches!(semicolon, Some(p) if p < 3) {
            return false;
        }
        if matches!(brace, Some(p) if p < 4) {
            return false;
        }
    }
    match bytes[0] {
        b's' => {
            if strict {
                if bytes[bytes.len() - 2] != b'"' {
                    return false;
                }
            } else if !data.contains('"') {
                return false;
            }
            has_length_prefix(bytes)
        }
        b'a' | b'O' => has_length_prefix(bytes),
        b'b' | b'i' | b'd' => {
            let body = &bytes[2..];
            let end = match body.iter().position(|&c| c == b';') {
                Some(p) => p,
                None => return false,
            };
            if end == 0 {
                return false;
            }
            if !body[..end]
                .iter()
                .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'E' | b'-'))
            {
                return false;
            }
            // Strict mode anchors the terminator to the end of input.
            !strict || end == body.len() - 1
        }
        _ => false,
    }
}

/// Matches the `X:<digits>:` prefix shared by string and container tags.
fn has_length_prefix(bytes: &[u8]) -> bool {
    let body = &bytes[2..];
    match body.iter().position(|&c| c == b':') {
        Some(colon) => colon > 0 && body[..colon].iter().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn serialize_value(value: &MetaValue) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &MetaValue, out: &mut String) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&format!("i:{i};"));
            } else if let Some(u) = n.as_u64() {
                out.push_str(&format!("i:{u};"));
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                out.push_str(&format!("d:{f};"));
            }
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (index, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{index};"));
                write_value(item, out);
            }
            out.push('}');
        }
        Value::Object(map) => {
            out.push_str(&format!("a:{}:{{", map.len()));
            for (key, item) in map {
                write_string(key, out);
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // Length-prefixed raw bytes, no escaping.
    out.push_str(&format!("s:{}:\"{s}\";", s.len()));
}

/// Parse a serialized payload. `None` on any structural defect.
fn unserialize(data: &str) -> Option<MetaValue> {
    let mut parser = Parser {
        bytes: data.as_bytes(),
        pos: 0,
    };
    let value = parser.parse_value(0)?;
    // Trailing bytes mean the payload was not what it claimed to be.
    if parser.pos == parser.bytes.len() {
        Some(value)
    } else {
        None
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn bump(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, expected: u8) -> Option<()> {
        if self.bump()? == expected {
            Some(())
        } else {
            None
        }
    }

    /// Consume bytes up to and including `stop`; returns the bytes before it.
    fn take_until(&mut self, stop: u8) -> Option<&[u8]> {
        let start = self.pos;
        let offset = self.bytes[start..].iter().position(|&c| c == stop)?;
        self.pos = start + offset + 1;
        Some(&self.bytes[start..start + offset])
    }

    fn take_len(&mut self, len: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(len)?;
        if end > self.bytes.len() {
            return None;
        }
        let raw = &self.bytes[self.pos..end];
        self.pos = end;
        Some(raw)
    }

    fn parse_value(&mut self, depth: usize) -> Option<MetaValue> {
        if depth > MAX_DEPTH {
            return None;
        }
        match self.bump()? {
            b'N' => {
                self.expect(b';')?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = match self.bump()? {
                    b'0' => false,
                    b'1' => true,
                    _ => return None,
                };
                self.expect(b';')?;
                Some(Value::Bool(flag))
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.take_until(b';')?;
                let n: i64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
                Some(Value::from(n))
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.take_until(b';')?;
                let f: f64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
                Some(Value::Number(Number::from_f64(f)?))
            }
            b's' => {
                self.expect(b':')?;
                let len = self.parse_length()?;
                self.expect(b'"')?;
                let raw = self.take_len(len)?;
                let s = std::str::from_utf8(raw).ok()?.to_string();
                self.expect(b'"')?;
                self.expect(b';')?;
                Some(Value::String(s))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.parse_length()?;
                self.expect(b'{')?;
                // No preallocation: count comes from untrusted input.
                let mut entries = Vec::new();
                for _ in 0..count {
                    let key = self.parse_value(depth + 1)?;
                    let value = self.parse_value(depth + 1)?;
                    entries.push((key, value));
                }
                self.expect(b'}')?;
                assemble_container(entries)
            }
            // Class-instance payloads are not representable here.
            _ => None,
        }
    }

    fn parse_length(&mut self) -> Option<usize> {
        let raw = self.take_until(b':')?;
        if raw.is_empty() || !raw.iter().all(|c| c.is_ascii_digit()) {
            return None;
        }
        std::str::from_utf8(raw).ok()?.parse().ok()
    }
}

/// A container decodes to a list when its keys are exactly `0..n`,
/// otherwise to a keyed map with stringified keys.
///
/// The empty container is ambiguous: the format writes `a:0:{}` for
/// both an empty list and an empty map, so it decodes as the empty
/// list, the canonical form.
fn assemble_container(entries: Vec<(MetaValue, MetaValue)>) -> Option<MetaValue> {
    let is_list = entries
        .iter()
        .enumerate()
        .all(|(i, (key, _))| matches!(key, Value::Number(n) if n.as_u64() == Some(i as u64)));

    if is_list {
        return Some(Value::Array(
            entries.into_iter().map(|(_, value)| value).collect(),
        ));
    }

    let mut map = Map::new();
    for (key, value) in entries {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        map.insert(key, value);
    }
    Some(Value::Object(map))
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// The decode side cannot tell an empty map from an empty list;
    /// both encode as `a:0:{}` and come back as the empty list.
    fn canonical(meta: &MetaValue) -> MetaValue {
        match meta {
            Value::Object(map) if map.is_empty() => Value::Array(Vec::new()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
            other => other.clone(),
        }
    }

    fn arb_meta() -> impl Strategy<Value = MetaValue> {
        let leaf = prop_oneof![
            Just(MetaValue::Null),
            any::<bool>().prop_map(MetaValue::from),
            any::<i64>().prop_map(MetaValue::from),
            "[a-zA-Z0-9 :;{}\"]{0,24}".prop_map(MetaValue::from),
        ];
        leaf.prop_recursive(4, 32, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(MetaValue::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..8)
                    .prop_map(|m| json!(m)),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Decode never panics, whatever bytes the store hands back.
        #[test]
        fn prop_unserialize_total(raw in ".{0,256}") {
            let _ = maybe_unserialize(&raw);
        }

        /// Structured values survive the encode/decode round trip, up
        /// to the empty-container spelling the format collapses.
        #[test]
        fn prop_structured_round_trip(meta in arb_meta()) {
            prop_assume!(meta.is_array() || meta.is_object());
            let stored = maybe_serialize(&meta);
            prop_assert_eq!(maybe_unserialize(&stored), canonical(&meta));
        }

        /// A plain scalar that does not look serialized is untouched.
        #[test]
        fn prop_plain_scalar_is_noop(s in "[a-zA-Z ]{0,64}") {
            prop_assume!(!is_serialized(&s, false));
            prop_assert_eq!(maybe_serialize(&json!(s.clone())), s);
        }
    }
}
