use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipKind {
    /// The file could not be read or parsed.
    Decode,
    /// The record failed validation.
    Rejected,
    /// The store refused the write.
    Store,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipKind::Decode => "decode failures",
            SkipKind::Rejected => "validation rejects",
            SkipKind::Store => "store failures",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkipEntry {
    pub filename: String,
    pub kind: SkipKind,
    pub reason: String,
}

impl SkipEntry {
    /// One line of the skip log.
    pub fn log_line(&self) -> String {
        format!("{} — {}", self.filename, self.reason)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FileOutcome {
    /// Written to the store, or would have been in a dry run.
    Stored { filename: String, id: String },
    Skipped(SkipEntry),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    pub discovered: usize,
    /// Records written, or records that would be written in a dry run.
    pub uploaded: usize,
    pub skipped: Vec<SkipEntry>,
    pub dry_run: bool,
    /// Set when a skip log file was written.
    pub skip_log: Option<PathBuf>,
}

impl BatchReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            discovered: 0,
            uploaded: 0,
            skipped: Vec::new(),
            dry_run,
            skip_log: None,
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Stored { .. } => self.uploaded += 1,
            FileOutcome::Skipped(entry) => self.skipped.push(entry),
        }
    }

    pub fn skipped_count(&self, kind: SkipKind) -> usize {
        self.skipped.iter().filter(|s| s.kind == kind).count()
    }

    /// Write one line per skipped file. When no file was skipped, any log
    /// left at `path` by an earlier run is removed and `false` is returned.
    pub fn write_skip_log(&self, path: &Path) -> std::io::Result<bool> {
        if self.skipped.is_empty() {
            return match std::fs::remove_file(path) {
                Ok(()) => Ok(false),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            };
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for entry in &self.skipped {
            writeln!(file, "{}", entry.log_line())?;
        }
        file.flush()?;
        Ok(true)
    }
}
