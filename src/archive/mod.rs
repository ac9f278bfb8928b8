//! Archive extraction for call analysis uploads.

mod scratch;

pub use scratch::ScratchDir;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Errors that can occur while reading an archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open archive {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("Corrupt archive entry #{index}: {message}")]
    CorruptEntry { index: usize, message: String },

    #[error("Archive entry escapes the extraction directory: {0}")]
    UnsafeEntry(String),
}

/// Default suffix of the per-call analysis files.
pub const DEFAULT_SUFFIX: &str = ".json";

/// Extracts an archive into a scratch directory and lists the files of interest.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    suffix: String,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX)
    }
}

impl ArchiveExtractor {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into().to_lowercase(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Check if a file name ends with the configured suffix, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(&self.suffix)
    }

    /// Decompress every entry of `archive_path` into `dest` and return the paths of
    /// the extracted files matching the suffix, sorted.
    pub fn extract(&self, archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let mut archive = open_archive(archive_path)?;
        fs::create_dir_all(dest)?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ExtractionError::CorruptEntry {
                    index,
                    message: e.to_string(),
                })?;

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| ExtractionError::UnsafeEntry(entry.name().to_string()))?;
            let output_path = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut content)
                .map_err(|e| ExtractionError::CorruptEntry {
                    index,
                    message: e.to_string(),
                })?;
            fs::write(&output_path, &content)?;
        }

        let mut files = Vec::new();
        for dir_entry in WalkDir::new(dest) {
            let dir_entry = dir_entry.map_err(|e| ExtractionError::Io(e.into()))?;
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy();
            if self.matches(&name) {
                files.push(dir_entry.into_path());
            }
        }
        files.sort();

        debug!(
            "Extracted {} entries from {}, {} match \"{}\"",
            archive.len(),
            archive_path.display(),
            files.len(),
            self.suffix
        );
        Ok(files)
    }

    /// List the names of matching entries without extracting anything.
    pub fn list_entry_names(&self, archive_path: &Path) -> Result<Vec<String>, ExtractionError> {
        let archive = open_archive(archive_path)?;
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && self.matches(name))
            .map(String::from)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Read every matching entry in memory, returning `(entry name, bytes)` pairs.
    pub fn read_entries(&self, archive_path: &Path) -> Result<Vec<(String, Vec<u8>)>, ExtractionError> {
        let mut archive = open_archive(archive_path)?;
        let mut out = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ExtractionError::CorruptEntry {
                    index,
                    message: e.to_string(),
                })?;
            if entry.is_dir() || !self.matches(entry.name()) {
                continue;
            }
            let name = entry.name().to_string();
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| ExtractionError::CorruptEntry {
                    index,
                    message: e.to_string(),
                })?;
            out.push((name, content));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<fs::File>, ExtractionError> {
    let file = fs::File::open(path).map_err(|e| ExtractionError::Unreadable {
        path: path.to_owned(),
        message: e.to_string(),
    })?;
    zip::ZipArchive::new(file).map_err(|e| ExtractionError::Unreadable {
        path: path.to_owned(),
        message: e.to_string(),
    })
}
