use super::canonical::{CanonicalRecord, GraphPoint, UNKNOWN};
use super::RawRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;

/// Maps accepted raw records onto the canonical shape.
#[derive(Clone, Debug, Default)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawRecord, filename: &str) -> CanonicalRecord {
        let text = |name: &str| {
            raw.metadata_field(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let date_raw = raw.metadata_field("date").map(String::from);
        let call_date = date_raw.as_deref().and_then(parse_call_date);

        let low_confidences = raw
            .metadata
            .as_ref()
            .and_then(|m| m.low_confidences)
            .or(raw.low_confidences)
            .map(|v| v as i64)
            .unwrap_or(0);

        let speaking_time_per_speaker: BTreeMap<String, u32> = raw
            .speaking_time_per_speaker
            .iter()
            .map(|(speaker, duration)| (speaker.clone(), mmss_to_seconds(duration)))
            .collect();
        let call_duration_seconds = speaking_time_per_speaker
            .values()
            .fold(0u32, |acc, s| acc.saturating_add(*s));

        let emotion = |name: &str| {
            raw.emotion_counts
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| (*v).max(0))
                .sum::<i64>()
        };

        let emotion_graph = raw
            .emotion_graph
            .iter()
            .map(|point| GraphPoint {
                x: point.x.clone(),
                seconds: mmss_to_seconds(&point.x),
                y: point.y,
            })
            .collect();

        CanonicalRecord {
            call_id: derive_identifier(raw, filename),
            agent: text("agent").unwrap_or_else(|| UNKNOWN.to_string()),
            company: text("company").unwrap_or_else(|| UNKNOWN.to_string()),
            time: text("time").unwrap_or_else(|| UNKNOWN.to_string()),
            date_raw,
            call_date,
            average_happiness_value: raw.average_happiness_value,
            low_confidences,
            angry: emotion("angry"),
            happy: emotion("happy"),
            neutral: emotion("neutral"),
            sad: emotion("sad"),
            speaking_time_per_speaker,
            call_duration_seconds,
            emotion_graph,
        }
    }
}

/// `metadata.call_id` when present and non-empty, otherwise the file stem.
pub fn derive_identifier(raw: &RawRecord, filename: &str) -> String {
    raw.metadata_field("call_id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(|| filename_stem(filename))
}

pub fn filename_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Parse an 8 digit MMDDYYYY date. Anything else, including impossible
/// calendar dates, yields `None`.
pub fn parse_call_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u32 = raw[0..2].parse().ok()?;
    let day: u32 = raw[2..4].parse().ok()?;
    let year: i32 = raw[4..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// "MM:SS" to total seconds; malformed values count as 0.
pub fn mmss_to_seconds(value: &str) -> u32 {
    let mut parts = value.trim().split(':');
    let (Some(minutes), Some(seconds), None) = (parts.next(), parts.next(), parts.next()) else {
        return 0;
    };
    match (minutes.trim().parse::<u32>(), seconds.trim().parse::<u32>()) {
        (Ok(m), Ok(s)) => m.saturating_mul(60).saturating_add(s),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawGraphPoint, RawMetadata};

    fn with_metadata(metadata: RawMetadata) -> RawRecord {
        RawRecord {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    #[test]
    fn test_mmss_to_seconds() {
        assert_eq!(mmss_to_seconds("00:00"), 0);
        assert_eq!(mmss_to_seconds("01:30"), 90);
        assert_eq!(mmss_to_seconds("12:05"), 725);
        assert_eq!(mmss_to_seconds("90:59"), 5459);
        assert_eq!(mmss_to_seconds(" 2:3 "), 123);
    }

    #[test]
    fn test_mmss_malformed_is_zero() {
        for bad in ["", "90", "aa:bb", "1:xx", "1:2:3", "-1:30", "1.5:20", ":"] {
            assert_eq!(mmss_to_seconds(bad), 0, "{:?}", bad);
        }
    }

    #[test]
    fn test_parse_call_date() {
        assert_eq!(parse_call_date("04012025"), NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(parse_call_date("12312024"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(parse_call_date("02292024"), NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn test_parse_call_date_invalid() {
        for bad in ["13452025", "02292025", "4012025", "040120250", "04-01-25", "", "abcdefgh"] {
            assert_eq!(parse_call_date(bad), None, "{:?}", bad);
        }
    }

    #[test]
    fn identifier_prefers_call_id() {
        let raw = with_metadata(RawMetadata {
            call_id: Some("A123".into()),
            ..Default::default()
        });
        assert_eq!(derive_identifier(&raw, "JSONs/other.json"), "A123");
    }

    #[test]
    fn identifier_falls_back_to_stem() {
        let empty_id = with_metadata(RawMetadata {
            call_id: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(derive_identifier(&empty_id, "JSONs/C77.json"), "C77");
        assert_eq!(derive_identifier(&RawRecord::default(), "B999.mp3.json"), "B999.mp3");
    }

    #[test]
    fn defaults_for_empty_record() {
        let record = RecordNormalizer::new().normalize(&RawRecord::default(), "Z1.json");
        assert_eq!(record.call_id, "Z1");
        assert_eq!(record.agent, UNKNOWN);
        assert_eq!(record.company, UNKNOWN);
        assert_eq!(record.time, UNKNOWN);
        assert_eq!(record.date_raw, None);
        assert_eq!(record.call_date, None);
        assert_eq!(record.average_happiness_value, None);
        assert_eq!(record.low_confidences, 0);
        assert_eq!(record.total_emotions(), 0);
        assert!(record.speaking_time_per_speaker.is_empty());
        assert_eq!(record.call_duration_seconds, 0);
    }

    #[test]
    fn emotions_project_to_known_names() {
        let raw = RawRecord {
            emotion_counts: BTreeMap::from([
                ("happy".to_string(), 5),
                ("Angry".to_string(), 1),
                ("surprised".to_string(), 9),
                ("sad".to_string(), -2),
            ]),
            ..Default::default()
        };
        let record = RecordNormalizer::new().normalize(&raw, "x.json");
        assert_eq!((record.angry, record.happy, record.neutral, record.sad), (1, 5, 0, 0));
    }

    #[test]
    fn low_confidences_fall_back_to_top_level() {
        let mut raw = RawRecord {
            low_confidences: Some(4.0),
            ..Default::default()
        };
        assert_eq!(RecordNormalizer::new().normalize(&raw, "x.json").low_confidences, 4);

        raw.metadata = Some(RawMetadata {
            low_confidences: Some(2.9),
            ..Default::default()
        });
        assert_eq!(RecordNormalizer::new().normalize(&raw, "x.json").low_confidences, 2);
    }

    #[test]
    fn speaking_times_and_graph() {
        let raw = RawRecord {
            speaking_time_per_speaker: BTreeMap::from([
                ("Speaker 0".to_string(), "01:30".to_string()),
                ("Speaker 1".to_string(), "garbage".to_string()),
                ("Speaker 2".to_string(), "00:15".to_string()),
            ]),
            emotion_graph: vec![RawGraphPoint {
                x: "00:10".into(),
                y: Some(0.4),
            }],
            ..Default::default()
        };
        let record = RecordNormalizer::new().normalize(&raw, "x.json");
        assert_eq!(record.speaking_time_per_speaker["Speaker 0"], 90);
        assert_eq!(record.speaking_time_per_speaker["Speaker 1"], 0);
        assert_eq!(record.call_duration_seconds, 105);
        assert_eq!(
            record.emotion_graph,
            vec![GraphPoint {
                x: "00:10".into(),
                seconds: 10,
                y: Some(0.4)
            }]
        );
    }

    #[test]
    fn invalid_date_keeps_raw_value() {
        let raw = with_metadata(RawMetadata {
            date: Some("13452025".into()),
            ..Default::default()
        });
        let record = RecordNormalizer::new().normalize(&raw, "x.json");
        assert_eq!(record.date_raw.as_deref(), Some("13452025"));
        assert_eq!(record.call_date, None);
    }
}
