mod canonical;
mod normalize;
mod raw;
mod validate;

pub use canonical::{CanonicalRecord, GraphPoint, KNOWN_EMOTIONS, UNKNOWN};
pub use normalize::{derive_identifier, filename_stem, mmss_to_seconds, parse_call_date, RecordNormalizer};
pub use raw::{RawGraphPoint, RawMetadata, RawRecord};
pub use validate::{
    RecordValidator, Rejection, Validation, ValidationMode, DEFAULT_JUNK_SUFFIXES,
    REQUIRED_METADATA_FIELDS,
};

use serde::Deserialize;
use thiserror::Error;

/// A file that could not be turned into a raw record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Syntax(serde_json::Error),

    #[error("unexpected structure: {0}")]
    Shape(String),
}

/// Decode the bytes of one analysis file.
pub fn decode_record(bytes: &[u8]) -> Result<RawRecord, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    // Some exporters prepend a byte order mark.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::Syntax)?;
    if !value.is_object() {
        return Err(DecodeError::Shape("top level is not a JSON object".to_string()));
    }
    RawRecord::deserialize(value).map_err(|e| DecodeError::Shape(e.to_string()))
}
