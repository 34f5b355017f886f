use std::collections::BTreeMap;

use serde_json::Map;

use crate::extractor::decode::decode_payload;
use crate::extractor::transformations::values::{extract_addresses, flatten};
use crate::models::errors::DecodeError;
use crate::models::events::{BlockHeader, OutputEvent, RawEvent};
use crate::models::values::{CompositeKind, TypedValue};

pub trait EventTransformer {
    fn transform_event(&self, header: Option<&BlockHeader>) -> Result<OutputEvent, DecodeError>;
}

impl EventTransformer for RawEvent {
    /// Decodes the payload, flattens every declared field, and assembles the
    /// output record. Pure combination of already-fetched data; a failure
    /// drops only this event from its block's batch.
    fn transform_event(&self, header: Option<&BlockHeader>) -> Result<OutputEvent, DecodeError> {
        let decoded = decode_payload(&self.payload)?;
        let TypedValue::Composite(composite) = decoded else {
            return Err(DecodeError::NotAnEvent);
        };
        if composite.kind != CompositeKind::Event {
            return Err(DecodeError::NotAnEvent);
        }
        composite.check_alignment()?;

        let mut fields = Map::new();
        let mut types: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in composite.fields() {
            if let Some(flat) = flatten(value) {
                fields.insert(name.clone(), flat);
            }
            let addresses = extract_addresses(value);
            if !addresses.is_empty() {
                types.insert(name.clone(), addresses);
            }
        }

        let transaction_id = self.transaction_id.to_string();
        // Canonical id scheme: height-transactionID-eventIndex; the short
        // form applies only when no block context is available.
        let id = match header {
            Some(h) => format!("{}-{}-{}", h.height, transaction_id, self.event_index),
            None => format!("{}-{}", transaction_id, self.event_index),
        };

        Ok(OutputEvent {
            id,
            fields,
            transaction_id,
            name: self.type_name.clone(),
            transaction_index: self.transaction_index,
            event_index: self.event_index,
            block_height: header.map(|h| h.height),
            timestamp: header.map(|h| h.timestamp),
            types: if types.is_empty() { None } else { Some(types) },
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::models::events::TransactionId;

    fn raw_event(payload: serde_json::Value) -> RawEvent {
        RawEvent {
            type_name: "A.0000000000000001.Example.Tested".to_owned(),
            transaction_id: TransactionId([0x11; 32]),
            transaction_index: 3,
            event_index: 2,
            payload: payload.to_string().into_bytes(),
        }
    }

    fn deposit_payload() -> serde_json::Value {
        json!({
            "type": "Event",
            "value": {
                "id": "A.0000000000000001.Example.Tested",
                "fields": [
                    {"name": "amount", "value": {"type": "UFix64", "value": "1.00000000"}},
                    {"name": "to", "value": {"type": "Address", "value": "0xab"}},
                    {"name": "memo", "value": {"type": "Optional", "value": null}},
                ],
            },
        })
    }

    #[test]
    fn materializes_with_block_context() {
        let header = BlockHeader {
            height: 1000,
            timestamp: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
        };
        let event = raw_event(deposit_payload())
            .transform_event(Some(&header))
            .unwrap();

        let tx = "11".repeat(32);
        assert_eq!(event.id, format!("1000-{tx}-2"));
        assert_eq!(event.transaction_id, tx);
        assert_eq!(event.transaction_index, 3);
        assert_eq!(event.event_index, 2);
        assert_eq!(event.block_height, Some(1000));
        assert_eq!(event.timestamp, Some(header.timestamp));
        assert_eq!(event.fields.get("amount"), Some(&json!(1.0)));
        assert_eq!(event.fields.get("to"), Some(&json!("0xab")));
        // Absent optional: the key is omitted, not null.
        assert!(!event.fields.contains_key("memo"));
        assert_eq!(
            event.types.as_ref().unwrap().get("to"),
            Some(&vec!["0xab".to_owned()])
        );
    }

    #[test]
    fn short_id_without_block_context() {
        let event = raw_event(deposit_payload()).transform_event(None).unwrap();
        let tx = "11".repeat(32);
        assert_eq!(event.id, format!("{tx}-2"));
        assert_eq!(event.block_height, None);
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn declared_field_names_key_the_mapping() {
        let payload = json!({
            "type": "Event",
            "value": {
                "id": "A.01.T.E",
                "fields": [
                    {"name": "a", "value": {"type": "Int", "value": "1"}},
                    {"name": "b", "value": {"type": "Int", "value": "2"}},
                    {"name": "c", "value": {"type": "Int", "value": "3"}},
                ],
            },
        });
        let event = raw_event(payload).transform_event(None).unwrap();
        let keys: Vec<_> = event.fields.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn non_event_payloads_are_rejected() {
        let not_composite = raw_event(json!({"type": "Int", "value": "1"}));
        assert!(matches!(
            not_composite.transform_event(None),
            Err(DecodeError::NotAnEvent)
        ));

        let wrong_kind = raw_event(json!({
            "type": "Struct",
            "value": {"id": "A.01.T.S", "fields": []},
        }));
        assert!(matches!(
            wrong_kind.transform_event(None),
            Err(DecodeError::NotAnEvent)
        ));
    }

    #[test]
    fn undecodable_payloads_are_decode_errors() {
        let event = raw_event(json!("gibberish"));
        assert!(event.transform_event(None).is_err());
    }
}
