mod file_config;

pub use file_config::{FileConfig, StoreConfig};

use crate::archive::DEFAULT_SUFFIX;
use crate::record::{ValidationMode, DEFAULT_JUNK_SUFFIXES};
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_COLLECTION: &str = "calls";
pub const DEFAULT_SKIP_LOG: &str = "skipped_files.log";
pub const DEFAULT_STORE_TIMEOUT_SEC: u64 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Firestore,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub archive_path: Option<PathBuf>,
    pub collection: Option<String>,
    pub skip_log_path: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub validation: Option<ValidationMode>,
    pub dry_run: bool,
    pub store_backend: Option<StoreBackend>,
    pub sqlite_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub database: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_sec: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: None,
            credentials_path: None,
            project_id: None,
            database: None,
            endpoint: None,
            timeout_sec: DEFAULT_STORE_TIMEOUT_SEC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archive_path: Option<PathBuf>,
    pub collection: String,
    pub skip_log_path: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub validation: ValidationMode,
    pub suffix: String,
    pub junk_suffixes: Vec<String>,
    pub dry_run: bool,
    pub store: StoreSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let archive_path = file
            .archive_path
            .map(PathBuf::from)
            .or_else(|| cli.archive_path.clone());

        let collection = file
            .collection
            .or_else(|| cli.collection.clone())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        if collection.is_empty() || collection.contains('/') {
            bail!("Invalid collection name {:?}", collection);
        }

        let skip_log_path = file
            .skip_log_path
            .map(PathBuf::from)
            .or_else(|| cli.skip_log_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SKIP_LOG));

        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .or_else(|| cli.scratch_dir.clone());

        let validation = match file.validation {
            Some(s) => parse_validation_mode(&s)?,
            None => cli.validation.unwrap_or_default(),
        };

        let suffix = file.suffix.unwrap_or_else(|| DEFAULT_SUFFIX.to_string());
        let junk_suffixes = file.junk_suffixes.unwrap_or_else(|| {
            DEFAULT_JUNK_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect()
        });

        let store = Self::resolve_store(cli, file.store.unwrap_or_default())?;

        Ok(Self {
            archive_path,
            collection,
            skip_log_path,
            scratch_dir,
            validation,
            suffix,
            junk_suffixes,
            dry_run: cli.dry_run,
            store,
        })
    }

    fn resolve_store(cli: &CliConfig, file: StoreConfig) -> Result<StoreSettings> {
        let backend = match file.backend {
            Some(s) => parse_store_backend(&s)?,
            None => cli.store_backend.unwrap_or_default(),
        };

        let settings = StoreSettings {
            backend,
            sqlite_path: file
                .sqlite_path
                .map(PathBuf::from)
                .or_else(|| cli.sqlite_path.clone()),
            credentials_path: file
                .credentials_path
                .map(PathBuf::from)
                .or_else(|| cli.credentials_path.clone()),
            project_id: file.project_id.or_else(|| cli.project_id.clone()),
            database: file.database,
            endpoint: file.endpoint.or_else(|| cli.endpoint.clone()),
            timeout_sec: file.timeout_sec.unwrap_or(DEFAULT_STORE_TIMEOUT_SEC),
        };

        match settings.backend {
            StoreBackend::Sqlite => {
                if settings.sqlite_path.is_none() {
                    bail!("sqlite_path must be specified via --sqlite-path or in config file");
                }
            }
            StoreBackend::Firestore => {
                if let Some(path) = &settings.credentials_path {
                    if !path.exists() {
                        bail!("Service account key file not found: {:?}", path);
                    }
                } else if settings.endpoint.is_none() {
                    bail!(
                        "Firestore needs --credentials (or credentials_path in config file), or an emulator --endpoint"
                    );
                }
            }
        }
        Ok(settings)
    }

    /// The archive to upload, required by the upload command.
    pub fn require_archive(&self) -> Result<&Path> {
        let path = self.archive_path.as_deref().ok_or_else(|| {
            anyhow!("archive_path must be specified on the command line or in config file")
        })?;
        if !path.is_file() {
            bail!("Archive not found: {:?}", path);
        }
        Ok(path)
    }
}

fn parse_validation_mode(s: &str) -> Result<ValidationMode> {
    ValidationMode::from_str(s, true).map_err(|_| anyhow!("Unknown validation mode {:?}", s))
}

fn parse_store_backend(s: &str) -> Result<StoreBackend> {
    StoreBackend::from_str(s, true).map_err(|_| anyhow!("Unknown store backend {:?}", s))
}
