#![allow(dead_code)]

pub const COLLECTION: &str = "calls";

/// A complete analysis file.
pub const A123_JSON: &str = r#"{
    "metadata": {
        "call_id": "A123",
        "agent": "Sam",
        "company": "Acme",
        "time": "09:00",
        "date": "04012025"
    },
    "average_happiness_value": 72.5,
    "emotion_counts": {"happy": 5, "angry": 1},
    "speaking_time_per_speaker": {"agent": "01:30", "customer": "00:45"},
    "emotion_graph": [{"x": "00:10", "y": 0.4}, {"x": "00:20", "y": 0.6}]
}"#;

/// Complete except for an impossible calendar date.
pub const BAD_DATE_JSON: &str = r#"{
    "metadata": {
        "call_id": "C777",
        "agent": "Ana",
        "company": "Globex",
        "time": "14:15",
        "date": "13452025"
    },
    "average_happiness_value": 40.0,
    "emotion_counts": {"sad": 2}
}"#;

/// Missing the `company` metadata field.
pub const NO_COMPANY_JSON: &str = r#"{
    "metadata": {"agent": "Sam", "time": "10:00", "date": "04022025"},
    "average_happiness_value": 50
}"#;

/// No call_id, so the file stem becomes the identifier.
pub const NO_CALL_ID_JSON: &str = r#"{
    "metadata": {"agent": "Lee", "company": "Initech", "time": "11:00", "date": "04032025"},
    "average_happiness_value": 61.0,
    "emotion_counts": {"neutral": 3, "surprised": 9}
}"#;

pub const NOT_JSON: &str = "{ this is not json";
