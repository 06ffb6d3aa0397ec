//! Shared lopdf helpers used across the lopdf-backed document source.

use lopdf::{Dictionary, Document, Object};
use serde_json::{json, Map, Value};

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_HOPS: usize = 32;

/// Nesting deeper than this is cut off when snapshotting objects as JSON.
const MAX_JSON_DEPTH: usize = 16;

/// Follow indirect references until a direct object is reached.
///
/// Dangling references and overly long chains resolve to `None`.
pub(crate) fn resolve<'a>(document: &'a Document, value: &'a Object) -> Option<&'a Object> {
    let mut current = value;
    for _ in 0..MAX_REFERENCE_HOPS {
        match current {
            Object::Reference(id) => current = document.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve a value that might be inline or a reference to a dictionary.
/// Stream dictionaries count.
pub(crate) fn resolve_dict<'a>(
    document: &'a Document,
    value: &'a Object,
) -> Option<&'a Dictionary> {
    match resolve(document, value)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Resolve a value that might be inline or a reference to an array.
pub(crate) fn resolve_array<'a>(
    document: &'a Document,
    value: &'a Object,
) -> Option<&'a [Object]> {
    resolve(document, value)?.as_array().ok().map(Vec::as_slice)
}

/// Look up `key` in `dict` and resolve it to a dictionary.
pub(crate) fn dict_entry<'a>(
    document: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    resolve_dict(document, dict.get(key).ok()?)
}

/// Extract a text string value from a PDF dictionary for a given key.
///
/// Returns `Some(String)` if the key exists and holds a non-empty string,
/// `None` otherwise.
pub(crate) fn extract_string_from_dict(
    document: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Option<String> {
    let value = resolve(document, dict.get(key).ok()?)?;
    value
        .as_str()
        .ok()
        .map(decode_text)
        .filter(|s| !s.is_empty())
}

/// The name stored under `key`, e.g. `/Subtype /Link` → `"Link"`.
pub(crate) fn name_from_dict(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let value = resolve(document, dict.get(key).ok()?)?;
    value
        .as_name()
        .ok()
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

/// Decode a PDF text string.
///
/// UTF-16BE (with byte-order mark) and UTF-8 are recognised; anything else is
/// read as single-byte PDFDocEncoding, approximated by Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Snapshot a PDF object as JSON.
///
/// Indirect references are not followed; they appear as `{"num", "gen"}`
/// like they do in viewer object dumps. Stream contents are summarised by
/// their length.
pub(crate) fn object_to_json(value: &Object) -> Value {
    to_json(value, 0)
}

fn to_json(value: &Object, depth: usize) -> Value {
    if depth > MAX_JSON_DEPTH {
        return Value::String("…".into());
    }
    match value {
        Object::Null => Value::Null,
        Object::Boolean(b) => Value::Bool(*b),
        Object::Integer(i) => json!(i),
        Object::Real(r) => json!(*r as f64),
        Object::Name(n) => json!({ "name": String::from_utf8_lossy(n) }),
        Object::String(s, _) => Value::String(decode_text(s)),
        Object::Array(items) => Value::Array(items.iter().map(|o| to_json(o, depth + 1)).collect()),
        Object::Dictionary(dict) => dict_to_json(dict, depth),
        Object::Stream(stream) => json!({
            "dict": dict_to_json(&stream.dict, depth),
            "length": stream.content.len(),
        }),
        Object::Reference((num, gen)) => json!({ "num": num, "gen": gen }),
    }
}

fn dict_to_json(dict: &Dictionary, depth: usize) -> Value {
    let map: Map<String, Value> = dict
        .iter()
        .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), to_json(v, depth + 1)))
        .collect();
    Value::Object(map)
}
