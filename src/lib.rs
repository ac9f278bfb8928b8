//! ACSI call analytics uploader
//!
//! Loads per-call emotion analysis artifacts from a zip archive, validates and
//! normalizes them, and upserts them into a document store. The library is
//! shared by the `acsi-upload` and `acsi-audit` binaries and by the tests.

pub mod archive;
pub mod audit;
pub mod cli_style;
pub mod config;
pub mod pipeline;
pub mod record;
pub mod sqlite_persistence;
pub mod store;

pub use archive::{ArchiveExtractor, ExtractionError, ScratchDir};
pub use config::{AppConfig, CliConfig, FileConfig, StoreBackend};
pub use pipeline::{BatchDriver, BatchReport, FileOutcome, SkipEntry, SkipKind};
pub use record::{CanonicalRecord, RawRecord, RecordNormalizer, RecordValidator, ValidationMode};
pub use store::{open_store, CallSink, DocumentStore, SqliteDocumentStore, StoreError};
