use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder stored for missing agent, company and time values.
pub const UNKNOWN: &str = "Unknown";

/// Emotion counters kept in the canonical record. Other emotions are dropped.
pub const KNOWN_EMOTIONS: [&str; 4] = ["angry", "happy", "neutral", "sad"];

/// The normalized, fixed-schema representation of one call, as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub call_id: String,
    pub agent: String,
    pub company: String,
    pub time: String,
    pub date_raw: Option<String>,
    pub call_date: Option<NaiveDate>,
    pub average_happiness_value: Option<f64>,
    pub low_confidences: i64,
    pub angry: i64,
    pub happy: i64,
    pub neutral: i64,
    pub sad: i64,
    pub speaking_time_per_speaker: BTreeMap<String, u32>,
    pub call_duration_seconds: u32,
    pub emotion_graph: Vec<GraphPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub x: String,
    pub seconds: u32,
    pub y: Option<f64>,
}

impl CanonicalRecord {
    /// The document identifier this record is stored under.
    pub fn identifier(&self) -> &str {
        &self.call_id
    }

    pub fn total_emotions(&self) -> i64 {
        self.angry + self.happy + self.neutral + self.sad
    }

    /// Serialize into the JSON document written to the store.
    pub fn to_document(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of plain fields always serializes to an object.
            _ => serde_json::Map::new(),
        }
    }
}
