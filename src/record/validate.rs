use super::RawRecord;
use serde::Deserialize;
use std::fmt;

/// Metadata fields a record must carry to be accepted in strict mode, in the
/// order they are checked.
pub const REQUIRED_METADATA_FIELDS: [&str; 4] = ["agent", "company", "time", "date"];

/// Filename suffixes of files that are known not to be call analyses.
pub const DEFAULT_JUNK_SUFFIXES: &[&str] = &[".mp3.json"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Reject junk files and records with incomplete metadata.
    #[default]
    Strict,
    /// Accept every decodable record.
    Lenient,
}

/// Why a record was refused. `Display` renders the reason written to the skip log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    JunkFilename,
    MissingMetadataField(&'static str),
    MissingAverageHappiness,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::JunkFilename => write!(f, "junk filename"),
            Rejection::MissingMetadataField(name) => write!(f, "missing metadata field: {}", name),
            Rejection::MissingAverageHappiness => write!(f, "missing average_happiness_value"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Validation {
    Accepted(RawRecord),
    Rejected(Rejection),
}

#[derive(Clone, Debug)]
pub struct RecordValidator {
    mode: ValidationMode,
    junk_suffixes: Vec<String>,
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(ValidationMode::Strict)
    }
}

impl RecordValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            junk_suffixes: DEFAULT_JUNK_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_junk_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.junk_suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn is_junk_filename(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.junk_suffixes.iter().any(|suffix| lower.ends_with(suffix))
    }

    /// Decide whether `record`, read from `filename`, may be stored.
    pub fn validate(&self, record: RawRecord, filename: &str) -> Validation {
        if self.mode == ValidationMode::Lenient {
            return Validation::Accepted(record);
        }
        match self.check(&record, filename) {
            Some(rejection) => Validation::Rejected(rejection),
            None => Validation::Accepted(record),
        }
    }

    fn check(&self, record: &RawRecord, filename: &str) -> Option<Rejection> {
        if self.is_junk_filename(filename) {
            return Some(Rejection::JunkFilename);
        }
        for field in REQUIRED_METADATA_FIELDS {
            let present = record
                .metadata_field(field)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Some(Rejection::MissingMetadataField(field));
            }
        }
        if record.average_happiness_value.is_none() {
            return Some(Rejection::MissingAverageHappiness);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawMetadata;

    fn complete() -> RawRecord {
        RawRecord {
            metadata: Some(RawMetadata {
                call_id: Some("A123".into()),
                agent: Some("Sam".into()),
                company: Some("Acme".into()),
                time: Some("09:00".into()),
                date: Some("04012025".into()),
                low_confidences: None,
            }),
            average_happiness_value: Some(72.5),
            ..Default::default()
        }
    }

    fn rejection(record: RawRecord, filename: &str) -> Option<String> {
        match RecordValidator::default().validate(record, filename) {
            Validation::Accepted(_) => None,
            Validation::Rejected(r) => Some(r.to_string()),
        }
    }

    #[test]
    fn accepts_complete_record() {
        assert_eq!(rejection(complete(), "A123.json"), None);
    }

    #[test]
    fn junk_filename_wins_over_everything() {
        assert_eq!(
            rejection(RawRecord::default(), "B999.mp3.json").as_deref(),
            Some("junk filename")
        );
        assert_eq!(
            rejection(complete(), "calls/B999.MP3.JSON").as_deref(),
            Some("junk filename")
        );
    }

    #[test]
    fn each_missing_field_is_named() {
        for field in REQUIRED_METADATA_FIELDS {
            let mut record = complete();
            let metadata = record.metadata.as_mut().unwrap();
            match field {
                "agent" => metadata.agent = None,
                "company" => metadata.company = Some(String::new()),
                "time" => metadata.time = Some("   ".into()),
                "date" => metadata.date = None,
                _ => unreachable!(),
            }
            let reason = rejection(record, "x.json").unwrap();
            assert_eq!(reason, format!("missing metadata field: {}", field));
        }
    }

    #[test]
    fn missing_metadata_reports_first_field() {
        let record = RawRecord {
            average_happiness_value: Some(1.0),
            ..Default::default()
        };
        assert_eq!(
            rejection(record, "x.json").as_deref(),
            Some("missing metadata field: agent")
        );
    }

    #[test]
    fn missing_happiness_is_rejected() {
        let mut record = complete();
        record.average_happiness_value = None;
        assert_eq!(
            rejection(record, "x.json").as_deref(),
            Some("missing average_happiness_value")
        );
    }

    #[test]
    fn unparseable_date_is_not_a_rejection() {
        let mut record = complete();
        record.metadata.as_mut().unwrap().date = Some("13452025".into());
        assert_eq!(rejection(record, "x.json"), None);
    }

    #[test]
    fn lenient_accepts_anything() {
        let validator = RecordValidator::new(ValidationMode::Lenient);
        assert!(matches!(
            validator.validate(RawRecord::default(), "B999.mp3.json"),
            Validation::Accepted(_)
        ));
    }

    #[test]
    fn custom_junk_suffixes() {
        let validator = RecordValidator::default().with_junk_suffixes([".WAV.json", "_test.json"]);
        assert!(validator.is_junk_filename("a.wav.json"));
        assert!(validator.is_junk_filename("call_test.json"));
        assert!(!validator.is_junk_filename("B999.mp3.json"));
    }
}
