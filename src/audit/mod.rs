//! Post-upload checks over the store and over the source archive.
//!
//! None of these mutate anything: they read the collection through
//! [`DocumentStore`] and the archive through [`ArchiveExtractor`] without
//! extracting it to disk.

use crate::archive::{ArchiveExtractor, ExtractionError};
use crate::record::{decode_record, derive_identifier, filename_stem};
use crate::store::{DocumentStore, StoreError};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Top level keys every analysis file is expected to carry.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 2] = ["metadata", "emotion_graph"];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MissingDate {
    pub id: String,
    pub date_raw: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntryProblem {
    pub entry: String,
    pub problem: String,
}

/// Result of a check over the entries of an archive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArchiveCheck {
    pub checked: usize,
    pub problems: Vec<EntryProblem>,
}

impl ArchiveCheck {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

pub fn count_documents(store: &dyn DocumentStore, collection: &str) -> Result<usize, AuditError> {
    Ok(store.count_documents(collection)?)
}

/// Documents whose `call_date` is null or absent, in id order.
pub fn documents_missing_date(
    store: &dyn DocumentStore,
    collection: &str,
    limit: Option<usize>,
) -> Result<Vec<MissingDate>, AuditError> {
    let missing = store
        .all_documents(collection)?
        .into_iter()
        .filter(|doc| matches!(doc.fields.get("call_date"), None | Some(Value::Null)))
        .map(|doc| MissingDate {
            date_raw: doc
                .fields
                .get("date_raw")
                .and_then(Value::as_str)
                .map(String::from),
            id: doc.id,
        })
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Ok(missing)
}

/// Archive entries whose identifier has no document in the collection.
///
/// The identifier is derived the same way the uploader does: `call_id` from
/// the file when it decodes, the file stem otherwise.
pub fn files_missing_from_store(
    store: &dyn DocumentStore,
    collection: &str,
    extractor: &ArchiveExtractor,
    archive_path: &Path,
) -> Result<Vec<EntryProblem>, AuditError> {
    let stored: HashSet<String> = store
        .all_documents(collection)?
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    debug!("{} documents in {}", stored.len(), collection);

    let mut missing = Vec::new();
    for (name, bytes) in extractor.read_entries(archive_path)? {
        let id = match decode_record(&bytes) {
            Ok(raw) => derive_identifier(&raw, &name),
            Err(_) => filename_stem(&name),
        };
        if !stored.contains(&id) {
            missing.push(EntryProblem {
                entry: name,
                problem: format!("no document {}", id),
            });
        }
    }
    Ok(missing)
}

/// Try to decode every entry of the archive.
pub fn check_json(
    extractor: &ArchiveExtractor,
    archive_path: &Path,
) -> Result<ArchiveCheck, AuditError> {
    let entries = extractor.read_entries(archive_path)?;
    let mut check = ArchiveCheck {
        checked: entries.len(),
        ..Default::default()
    };
    for (name, bytes) in entries {
        if let Err(e) = decode_record(&bytes) {
            check.problems.push(EntryProblem {
                entry: name,
                problem: e.to_string(),
            });
        }
    }
    Ok(check)
}

/// Report entries lacking any of `fields` at the top level.
pub fn check_fields<S: AsRef<str>>(
    extractor: &ArchiveExtractor,
    archive_path: &Path,
    fields: &[S],
) -> Result<ArchiveCheck, AuditError> {
    let entries = extractor.read_entries(archive_path)?;
    let mut check = ArchiveCheck {
        checked: entries.len(),
        ..Default::default()
    };
    for (name, bytes) in entries {
        let problem = match serde_json::from_slice::<Value>(strip_bom(&bytes)) {
            Ok(Value::Object(map)) => {
                let absent: Vec<&str> = fields
                    .iter()
                    .map(AsRef::as_ref)
                    .filter(|f| !map.contains_key(*f))
                    .collect();
                if absent.is_empty() {
                    continue;
                }
                format!("missing {}", absent.join(", "))
            }
            Ok(_) => "top level is not an object".to_string(),
            Err(e) => format!("invalid JSON: {}", e),
        };
        check.problems.push(EntryProblem {
            entry: name,
            problem,
        });
    }
    Ok(check)
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}
