//! Decodes the JSON wire encoding of structured event payloads into the
//! typed value model.
//!
//! Every node is a `{"type": ..., "value": ...}` pair; composites carry
//! `{"id": ..., "fields": [{"name", "value"}]}`. All integer kinds collapse
//! into the single arbitrary-precision `Int` variant, and kinds the decoder
//! does not model explicitly are preserved as `Other` for passthrough.

use num_bigint::BigInt;
use serde::Deserialize;
use serde_json::Value;

use crate::models::errors::DecodeError;
use crate::models::values::{Composite, CompositeKind, Fix64, TypedValue, UFix64};

const INTEGER_KINDS: &[&str] = &[
    "Int", "Int8", "Int16", "Int32", "Int64", "Int128", "Int256", "UInt", "UInt8", "UInt16",
    "UInt32", "UInt64", "UInt128", "UInt256", "Word8", "Word16", "Word32", "Word64",
];

#[derive(Debug, Deserialize)]
struct WireNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireComposite {
    id: String,
    fields: Vec<WireField>,
}

#[derive(Debug, Deserialize)]
struct WireField {
    name: String,
    value: WireNode,
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    key: WireNode,
    value: WireNode,
}

/// Decodes one event payload. The payload must hold a single wire-encoded
/// node; the caller decides whether the decoded shape qualifies as an event.
pub fn decode_payload(bytes: &[u8]) -> Result<TypedValue, DecodeError> {
    let node: WireNode = serde_json::from_slice(bytes)?;
    decode_node(node)
}

fn decode_node(node: WireNode) -> Result<TypedValue, DecodeError> {
    let WireNode { kind, value } = node;
    let invalid = |kind: &str| DecodeError::InvalidNode {
        kind: kind.to_owned(),
    };

    match kind.as_str() {
        "Void" => Ok(TypedValue::Nil),
        "Optional" => {
            if value.is_null() {
                Ok(TypedValue::Optional(Box::new(TypedValue::Nil)))
            } else {
                let inner: WireNode =
                    serde_json::from_value(value).map_err(|_| invalid("Optional"))?;
                Ok(TypedValue::Optional(Box::new(decode_node(inner)?)))
            }
        }
        "Bool" => value
            .as_bool()
            .map(TypedValue::Bool)
            .ok_or_else(|| invalid("Bool")),
        "String" | "Character" => value
            .as_str()
            .map(|s| TypedValue::String(s.to_owned()))
            .ok_or_else(|| invalid(&kind)),
        "Address" => {
            let text = value.as_str().ok_or_else(|| invalid("Address"))?;
            decode_address(text)
        }
        "UFix64" => {
            let text = value.as_str().ok_or_else(|| invalid("UFix64"))?;
            Ok(TypedValue::UFix64(UFix64::parse(text)?))
        }
        "Fix64" => {
            let text = value.as_str().ok_or_else(|| invalid("Fix64"))?;
            Ok(TypedValue::Fix64(Fix64::parse(text)?))
        }
        "Array" => {
            let items: Vec<WireNode> =
                serde_json::from_value(value).map_err(|_| invalid("Array"))?;
            Ok(TypedValue::Array(
                items
                    .into_iter()
                    .map(decode_node)
                    .collect::<Result<_, _>>()?,
            ))
        }
        "Dictionary" => {
            let entries: Vec<WireEntry> =
                serde_json::from_value(value).map_err(|_| invalid("Dictionary"))?;
            let pairs = entries
                .into_iter()
                .map(|entry| Ok((decode_node(entry.key)?, decode_node(entry.value)?)))
                .collect::<Result<_, DecodeError>>()?;
            Ok(TypedValue::Dictionary(pairs))
        }
        "Struct" | "Resource" | "Event" | "Contract" | "Enum" => {
            let composite_kind = match kind.as_str() {
                "Struct" => CompositeKind::Struct,
                "Resource" => CompositeKind::Resource,
                "Event" => CompositeKind::Event,
                "Contract" => CompositeKind::Contract,
                _ => CompositeKind::Enum,
            };
            let wire: WireComposite =
                serde_json::from_value(value).map_err(|_| invalid(&kind))?;
            let mut field_names = Vec::with_capacity(wire.fields.len());
            let mut field_values = Vec::with_capacity(wire.fields.len());
            for field in wire.fields {
                field_names.push(field.name);
                field_values.push(decode_node(field.value)?);
            }
            Ok(TypedValue::Composite(Composite {
                kind: composite_kind,
                type_id: wire.id,
                field_names,
                field_values,
            }))
        }
        "Type" => Ok(TypedValue::TypeTag(decode_type_descriptor(&value))),
        k if INTEGER_KINDS.contains(&k) => {
            let text = value.as_str().ok_or_else(|| invalid(k))?;
            let parsed = BigInt::parse_bytes(text.as_bytes(), 10).ok_or_else(|| {
                DecodeError::InvalidInteger {
                    text: text.to_owned(),
                }
            })?;
            Ok(TypedValue::Int(parsed))
        }
        _ => Ok(TypedValue::Other(value)),
    }
}

fn decode_address(text: &str) -> Result<TypedValue, DecodeError> {
    let bare = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(bare).map_err(|_| DecodeError::InvalidAddress {
        text: text.to_owned(),
    })?;
    Ok(TypedValue::Address(bytes))
}

/// Type descriptors stay opaque: older payloads carry a plain string, newer
/// ones an object with a `typeID`. Anything else is kept as compact JSON.
fn decode_type_descriptor(value: &Value) -> String {
    let static_type = value.get("staticType").unwrap_or(value);
    match static_type {
        Value::String(s) => s.clone(),
        other => other
            .get("typeID")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| other.to_string()),
    }
}
