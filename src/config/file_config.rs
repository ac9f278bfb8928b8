use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub archive_path: Option<String>,
    pub collection: Option<String>,
    pub skip_log_path: Option<String>,
    pub scratch_dir: Option<String>,
    /// "strict" or "lenient"
    pub validation: Option<String>,
    pub suffix: Option<String>,
    pub junk_suffixes: Option<Vec<String>>,

    pub store: Option<StoreConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend to use: "sqlite" or "firestore"
    pub backend: Option<String>,
    pub sqlite_path: Option<String>,
    pub credentials_path: Option<String>,
    pub project_id: Option<String>,
    pub database: Option<String>,
    /// Emulator host, e.g. "localhost:8080"
    pub endpoint: Option<String>,
    pub timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
