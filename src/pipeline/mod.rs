//! Batch upload of an archive of call analyses.
//!
//! Each file goes through decode, validation, normalization and upsert on its
//! own. Only a failure to open or extract the archive stops the batch; every
//! per-file failure becomes a skip entry.

mod report;

pub use report::{BatchReport, FileOutcome, SkipEntry, SkipKind};

use crate::archive::{ArchiveExtractor, ExtractionError, ScratchDir};
use crate::config::AppConfig;
use crate::record::{decode_record, RecordNormalizer, RecordValidator, Validation};
use crate::store::{CallSink, DocumentStore};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Cannot create scratch directory: {0}")]
    Scratch(std::io::Error),

    #[error("Cannot write skip log {path:?}: {source}")]
    SkipLog {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Progress notifications emitted while a batch runs.
pub enum ProgressEvent<'a> {
    /// Extraction finished, `usize` files will be processed.
    Discovered(usize),
    Processed(&'a FileOutcome),
}

pub struct BatchDriver<'a> {
    extractor: ArchiveExtractor,
    validator: RecordValidator,
    normalizer: RecordNormalizer,
    sink: CallSink<'a>,
    scratch_root: Option<PathBuf>,
    skip_log_path: Option<PathBuf>,
    dry_run: bool,
}

impl<'a> BatchDriver<'a> {
    pub fn new(sink: CallSink<'a>, validator: RecordValidator) -> Self {
        Self {
            extractor: ArchiveExtractor::default(),
            validator,
            normalizer: RecordNormalizer::new(),
            sink,
            scratch_root: None,
            skip_log_path: None,
            dry_run: false,
        }
    }

    pub fn from_config(config: &AppConfig, store: &'a dyn DocumentStore) -> Self {
        let validator =
            RecordValidator::new(config.validation).with_junk_suffixes(&config.junk_suffixes);
        Self::new(CallSink::new(store, config.collection.clone()), validator)
            .with_extractor(ArchiveExtractor::new(config.suffix.clone()))
            .with_scratch_root(config.scratch_dir.clone())
            .with_skip_log(Some(config.skip_log_path.clone()))
            .with_dry_run(config.dry_run)
    }

    pub fn with_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Where to write the skip log. `None` disables the file.
    pub fn with_skip_log(mut self, path: Option<PathBuf>) -> Self {
        self.skip_log_path = path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self, archive_path: &Path) -> Result<BatchReport, BatchError> {
        self.run_with_progress(archive_path, |_| {})
    }

    pub fn run_with_progress<F>(
        &self,
        archive_path: &Path,
        mut on_progress: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        let scratch = ScratchDir::create(self.scratch_root.as_deref()).map_err(BatchError::Scratch)?;
        info!(
            "Extracting {} into {}",
            archive_path.display(),
            scratch.path().display()
        );
        let files = self.extractor.extract(archive_path, scratch.path())?;
        info!("Found {} files to process", files.len());
        on_progress(ProgressEvent::Discovered(files.len()));

        let mut report = BatchReport::new(self.dry_run);
        report.discovered = files.len();

        for path in &files {
            let display_name = scratch.relative_name(path);
            let outcome = self.process_file(path, &display_name);
            on_progress(ProgressEvent::Processed(&outcome));
            report.record(outcome);
        }

        if let Err(e) = scratch.release() {
            warn!("Scratch directory cleanup failed: {}", e);
        }

        if let Some(path) = &self.skip_log_path {
            if report.write_skip_log(path).map_err(|source| BatchError::SkipLog {
                path: path.clone(),
                source,
            })? {
                report.skip_log = Some(path.clone());
            }
        }

        info!(
            "Finished: {} files, {} {}, {} skipped",
            report.discovered,
            report.uploaded,
            if self.dry_run { "would upload" } else { "uploaded" },
            report.skipped.len()
        );
        Ok(report)
    }

    /// Run one extracted file through decode, validation, normalization and upsert.
    pub fn process_file(&self, path: &Path, display_name: &str) -> FileOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name.to_string());

        let skip = |kind: SkipKind, reason: String| {
            warn!("Skipping {}: {}", display_name, reason);
            FileOutcome::Skipped(SkipEntry {
                filename: display_name.to_string(),
                kind,
                reason,
            })
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return skip(SkipKind::Decode, format!("read error: {}", e)),
        };
        let raw = match decode_record(&bytes) {
            Ok(raw) => raw,
            Err(e) => return skip(SkipKind::Decode, format!("decode error: {}", e)),
        };
        let raw = match self.validator.validate(raw, &file_name) {
            Validation::Accepted(raw) => raw,
            Validation::Rejected(rejection) => {
                return skip(SkipKind::Rejected, rejection.to_string())
            }
        };

        let record = self.normalizer.normalize(&raw, &file_name);
        if record.call_date.is_none() {
            debug!(
                "{}: unparseable date {:?}, storing without call_date",
                display_name, record.date_raw
            );
        }

        if self.dry_run {
            return FileOutcome::Stored {
                filename: display_name.to_string(),
                id: record.call_id,
            };
        }
        match self.sink.upsert(&record) {
            Ok(()) => FileOutcome::Stored {
                filename: display_name.to_string(),
                id: record.call_id,
            },
            Err(e) => skip(SkipKind::Store, format!("store error: {}", e)),
        }
    }
}
