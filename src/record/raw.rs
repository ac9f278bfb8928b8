use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One per-call analysis file as produced by the emotion analysis step.
///
/// Every field is optional; defaulting happens in the normalizer.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawRecord {
    pub metadata: Option<RawMetadata>,
    #[serde(deserialize_with = "lenient_f64")]
    pub average_happiness_value: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub low_confidences: Option<f64>,
    #[serde(deserialize_with = "lenient_string_map")]
    pub speaking_time_per_speaker: BTreeMap<String, String>,
    #[serde(deserialize_with = "lenient_count_map")]
    pub emotion_counts: BTreeMap<String, i64>,
    #[serde(deserialize_with = "lenient_graph")]
    pub emotion_graph: Vec<RawGraphPoint>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawMetadata {
    #[serde(deserialize_with = "lenient_string")]
    pub call_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub agent: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub low_confidences: Option<f64>,
}

/// A sample of the emotion graph, `x` is an "MM:SS" offset into the call.
#[derive(Clone, Debug, PartialEq)]
pub struct RawGraphPoint {
    pub x: String,
    pub y: Option<f64>,
}

impl RawRecord {
    /// Metadata string field by name, used by the validator.
    pub fn metadata_field(&self, name: &str) -> Option<&str> {
        let metadata = self.metadata.as_ref()?;
        let value = match name {
            "call_id" => &metadata.call_id,
            "agent" => &metadata.agent,
            "company" => &metadata.company,
            "time" => &metadata.time,
            "date" => &metadata.date,
            _ => return None,
        };
        value.as_deref()
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn lenient_string_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| {
                let text = value_to_string(&v).unwrap_or_default();
                (k, text)
            })
            .collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(de::Error::custom(format!(
            "expected an object of speaker times, found {}",
            type_name(&other)
        ))),
    }
}

fn lenient_count_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, i64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| {
                let count = value_to_f64(&v).map(|f| f as i64).unwrap_or(0);
                (k, count)
            })
            .collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(de::Error::custom(format!(
            "expected an object of emotion counts, found {}",
            type_name(&other)
        ))),
    }
}

fn lenient_graph<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RawGraphPoint>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(points) => Ok(points
            .iter()
            .filter_map(|point| {
                let point = point.as_object()?;
                Some(RawGraphPoint {
                    x: point.get("x").and_then(value_to_string).unwrap_or_default(),
                    y: point.get("y").and_then(value_to_f64),
                })
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(de::Error::custom(format!(
            "expected an emotion graph array, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let record: RawRecord = serde_json::from_str(
            r#"{
                "metadata": {"call_id": "A123", "agent": "Sam", "company": "Acme",
                             "time": "09:00", "date": "04012025", "low_confidences": 3},
                "average_happiness_value": 72.5,
                "speaking_time_per_speaker": {"Speaker 0": "01:30", "Speaker 1": "00:45"},
                "emotion_counts": {"happy": 5, "angry": 1},
                "emotion_graph": [{"x": "00:05", "y": 0.5}, {"x": "00:10", "y": -0.25}]
            }"#,
        )
        .unwrap();

        let metadata = record.metadata.as_ref().unwrap();
        assert_eq!(metadata.call_id.as_deref(), Some("A123"));
        assert_eq!(metadata.low_confidences, Some(3.0));
        assert_eq!(record.average_happiness_value, Some(72.5));
        assert_eq!(record.speaking_time_per_speaker["Speaker 0"], "01:30");
        assert_eq!(record.emotion_counts["happy"], 5);
        assert_eq!(record.emotion_graph.len(), 2);
        assert_eq!(record.emotion_graph[1].y, Some(-0.25));
    }

    #[test]
    fn empty_object_is_all_absent() {
        let record: RawRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, RawRecord::default());
    }

    #[test]
    fn numbers_in_string_fields_become_text() {
        let record: RawRecord =
            serde_json::from_str(r#"{"metadata": {"call_id": 991, "date": 4012025}}"#).unwrap();
        assert_eq!(record.metadata_field("call_id"), Some("991"));
        assert_eq!(record.metadata_field("date"), Some("4012025"));
    }

    #[test]
    fn null_and_wrong_scalars_decode_as_absent() {
        let record: RawRecord = serde_json::from_str(
            r#"{"average_happiness_value": null, "low_confidences": "many",
                "metadata": {"agent": null, "company": ["x"]}}"#,
        )
        .unwrap();
        assert_eq!(record.average_happiness_value, None);
        assert_eq!(record.low_confidences, None);
        assert_eq!(record.metadata_field("agent"), None);
        assert_eq!(record.metadata_field("company"), None);
    }

    #[test]
    fn non_object_metadata_is_an_error() {
        assert!(serde_json::from_str::<RawRecord>(r#"{"metadata": "oops"}"#).is_err());
        assert!(serde_json::from_str::<RawRecord>(r#"{"emotion_counts": [1, 2]}"#).is_err());
    }
}
