//! Flattens decoded structured values into generic JSON trees.
//!
//! `flatten` is pure and total over the value model: every variant has a
//! defined mapping, and subtrees that reduce to an empty mapping or sequence
//! collapse to absence rather than an empty `{}`/`[]`.

use serde_json::{Map, Number, Value};

use crate::models::values::TypedValue;

/// Converts a structured value into its generic JSON form. `None` means the
/// value is absent from the output entirely (the parent omits the key or
/// drops the item).
pub fn flatten(value: &TypedValue) -> Option<Value> {
    match value {
        TypedValue::Nil => None,
        TypedValue::Optional(inner) => flatten(inner),
        TypedValue::Bool(b) => Some(Value::Bool(*b)),
        TypedValue::Int(i) => exact_integer(&i.to_string()).map(Value::Number),
        TypedValue::UFix64(v) => float_number(v.to_f64()),
        TypedValue::Fix64(v) => float_number(v.to_f64()),
        TypedValue::String(_) => {
            let text = get_and_unquote_string(value);
            if text.is_empty() {
                None
            } else {
                Some(Value::String(text))
            }
        }
        TypedValue::Address(bytes) => Some(Value::String(ensure_starts_with_0x(&hex::encode(
            bytes,
        )))),
        TypedValue::TypeTag(descriptor) => Some(Value::String(descriptor.clone())),
        TypedValue::Array(items) => {
            let flattened: Vec<Value> = items.iter().filter_map(flatten).collect();
            if flattened.is_empty() {
                None
            } else {
                Some(Value::Array(flattened))
            }
        }
        TypedValue::Dictionary(pairs) => {
            let mut mapping = Map::new();
            for (key, val) in pairs {
                let key = get_and_unquote_string(key);
                if key.is_empty() {
                    continue;
                }
                if let Some(flat) = flatten(val) {
                    mapping.insert(key, flat);
                }
            }
            if mapping.is_empty() {
                None
            } else {
                Some(Value::Object(mapping))
            }
        }
        TypedValue::Composite(composite) => {
            let mut mapping = Map::new();
            for (name, val) in composite.fields() {
                if let Some(flat) = flatten(val) {
                    mapping.insert(name.clone(), flat);
                }
            }
            if mapping.is_empty() {
                None
            } else {
                Some(Value::Object(mapping))
            }
        }
        TypedValue::Other(raw) => {
            if raw.is_null() {
                Some(Value::String(String::new()))
            } else {
                Some(raw.clone())
            }
        }
    }
}

/// Collects the normalized string form of every `Address` leaf reachable
/// through optionals, dictionary values, composite fields, and array items.
pub fn extract_addresses(value: &TypedValue) -> Vec<String> {
    match value {
        TypedValue::Optional(inner) => extract_addresses(inner),
        TypedValue::Address(bytes) => vec![ensure_starts_with_0x(&hex::encode(bytes))],
        TypedValue::Array(items) => items.iter().flat_map(extract_addresses).collect(),
        TypedValue::Dictionary(pairs) => pairs
            .iter()
            .flat_map(|(_, val)| extract_addresses(val))
            .collect(),
        TypedValue::Composite(composite) => composite
            .field_values
            .iter()
            .flat_map(extract_addresses)
            .collect(),
        TypedValue::Nil
        | TypedValue::Bool(_)
        | TypedValue::Int(_)
        | TypedValue::UFix64(_)
        | TypedValue::Fix64(_)
        | TypedValue::String(_)
        | TypedValue::TypeTag(_)
        | TypedValue::Other(_) => Vec::new(),
    }
}

/// Prefixes bare hex with `0x`; already-prefixed text passes through so the
/// canonical form is never double-prefixed.
pub fn ensure_starts_with_0x(text: &str) -> String {
    if text.starts_with("0x") {
        text.to_owned()
    } else {
        format!("0x{text}")
    }
}

/// Renders a value's raw text and unquotes it when the text is itself a
/// double-quoted literal. When unquoting fails the raw text is used verbatim,
/// unless it still carries unicode escape markers, in which case the original
/// source string wins. The fallback order is a compatibility contract.
pub fn get_and_unquote_string(value: &TypedValue) -> String {
    let raw = raw_text(value);
    match unquote(&raw) {
        Some(text) => text,
        None => {
            if raw.contains("\\u") || raw.contains("\\U") {
                source_text(value)
            } else {
                raw
            }
        }
    }
}

fn source_text(value: &TypedValue) -> String {
    match value {
        TypedValue::String(s) => s.clone(),
        other => raw_text(other),
    }
}

fn raw_text(value: &TypedValue) -> String {
    match value {
        TypedValue::Nil => String::new(),
        TypedValue::Optional(inner) => raw_text(inner),
        TypedValue::Bool(b) => b.to_string(),
        TypedValue::Int(i) => i.to_string(),
        TypedValue::UFix64(v) => v.to_string(),
        TypedValue::Fix64(v) => v.to_string(),
        TypedValue::String(s) => s.clone(),
        TypedValue::Address(bytes) => hex::encode(bytes),
        TypedValue::TypeTag(descriptor) => descriptor.clone(),
        TypedValue::Other(Value::String(s)) => s.clone(),
        TypedValue::Other(Value::Null) => String::new(),
        TypedValue::Other(raw) => raw.to_string(),
        collection => flatten(collection)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

/// Interprets `text` as a double-quoted string literal, processing the usual
/// escape sequences including `\uXXXX` surrogate pairs. `None` when the text
/// is not a well-formed literal.
fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                '/' => out.push('/'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{0008}'),
                'f' => out.push('\u{000C}'),
                'u' | 'U' => {
                    let code = hex_escape(&mut chars)?;
                    if (0xD800..0xDC00).contains(&code) {
                        if chars.next()? != '\\' {
                            return None;
                        }
                        if !matches!(chars.next()?, 'u' | 'U') {
                            return None;
                        }
                        let low = hex_escape(&mut chars)?;
                        if !(0xDC00..0xE000).contains(&low) {
                            return None;
                        }
                        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                        out.push(char::from_u32(combined)?);
                    } else {
                        out.push(char::from_u32(code)?);
                    }
                }
                _ => return None,
            },
            _ => out.push(c),
        }
    }
    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut code = 0u32;
    for _ in 0..4 {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    Some(code)
}

fn exact_integer(literal: &str) -> Option<Number> {
    // Relies on serde_json's arbitrary_precision feature so integers wider
    // than 64 bits survive without rounding.
    serde_json::from_str(literal).ok()
}

fn float_number(value: f64) -> Option<Value> {
    Number::from_f64(value).map(Value::Number)
}
