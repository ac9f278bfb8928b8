//! Conversion between plain JSON and the typed values of the Firestore REST API.

use crate::store::StoreError;
use serde_json::{json, Map, Value};

pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode_value).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let typed = value
        .as_object()
        .and_then(|o| o.iter().next())
        .map(|(kind, inner)| (kind.as_str(), inner))
        .ok_or_else(|| StoreError::Malformed(format!("not a typed value: {}", value)))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| StoreError::Malformed(format!("integerValue {:?}: {}", s, e))),
        ("integerValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        // Non-finite doubles come back as strings and have no JSON form.
        ("doubleValue", Value::String(_)) => Ok(Value::Null),
        ("stringValue", Value::String(s))
        | ("timestampValue", Value::String(s))
        | ("referenceValue", Value::String(s))
        | ("bytesValue", Value::String(s)) => Ok(Value::String(s.clone())),
        ("geoPointValue", Value::Object(point)) => Ok(Value::Object(point.clone())),
        ("arrayValue", Value::Object(array)) => {
            let values = match array.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        ("mapValue", Value::Object(map)) => match map.get("fields") {
            Some(Value::Object(fields)) => Ok(Value::Object(decode_fields(fields)?)),
            _ => Ok(Value::Object(Map::new())),
        },
        (kind, _) => Err(StoreError::Malformed(format!("unsupported value {}", kind))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(encode_value(&json!(null)), json!({"nullValue": null}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&json!(5)), json!({"integerValue": "5"}));
        assert_eq!(encode_value(&json!(72.5)), json!({"doubleValue": 72.5}));
        assert_eq!(encode_value(&json!("Acme")), json!({"stringValue": "Acme"}));
    }

    #[test]
    fn encodes_nested_values() {
        let encoded = encode_value(&json!({"times": {"Speaker 0": 90}, "graph": [], "tags": ["a"]}));
        assert_eq!(
            encoded,
            json!({"mapValue": {"fields": {
                "times": {"mapValue": {"fields": {"Speaker 0": {"integerValue": "90"}}}},
                "graph": {"arrayValue": {}},
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}]}}
            }}})
        );
    }

    #[test]
    fn decodes_what_it_encodes() {
        let original = json!({
            "call_id": "A123",
            "call_date": null,
            "happy": 5,
            "average_happiness_value": 72.5,
            "speaking_time_per_speaker": {"Speaker 0": 90},
            "emotion_graph": [{"x": "00:10", "seconds": 10, "y": 0.4}],
            "empty": []
        });
        let fields = original.as_object().unwrap();
        let decoded = decode_fields(&encode_fields(fields)).unwrap();
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn decodes_server_only_types() {
        assert_eq!(
            decode_value(&json!({"timestampValue": "2025-04-01T00:00:00Z"})).unwrap(),
            json!("2025-04-01T00:00:00Z")
        );
        assert_eq!(decode_value(&json!({"mapValue": {}})).unwrap(), json!({}));
        assert_eq!(decode_value(&json!({"doubleValue": "NaN"})).unwrap(), Value::Null);
    }

    #[test]
    fn rejects_untyped_values() {
        assert!(decode_value(&json!("plain")).is_err());
        assert!(decode_value(&json!({"integerValue": "x"})).is_err());
        assert!(decode_value(&json!({"mysteryValue": 1})).is_err());
    }

    #[test]
    fn decodes_each_value_kind() {
        assert_eq!(decode_value(&json!({"nullValue": null})).unwrap(), Value::Null);
        assert_eq!(decode_value(&json!({"booleanValue": true})).unwrap(), json!(true));
        assert_eq!(decode_value(&json!({"integerValue": "42"})).unwrap(), json!(42));
        assert_eq!(decode_value(&json!({"doubleValue": 72.5})).unwrap(), json!(72.5));
        assert_eq!(decode_value(&json!({"stringValue": "Sam"})).unwrap(), json!("Sam"));
        assert_eq!(
            decode_value(&json!({"arrayValue": {"values": [{"integerValue": "1"}, {"stringValue": "a"}]}}))
                .unwrap(),
            json!([1, "a"])
        );
        assert_eq!(decode_value(&json!({"arrayValue": {}})).unwrap(), json!([]));
        assert_eq!(
            decode_value(&json!({"mapValue": {"fields": {"happy": {"integerValue": "5"}}}})).unwrap(),
            json!({"happy": 5})
        );
    }
}
