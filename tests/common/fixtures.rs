#![allow(dead_code)]

use super::constants::COLLECTION;
use acsi_uploader::store::{Document, DocumentPage};
use acsi_uploader::{
    BatchDriver, CallSink, DocumentStore, RecordValidator, SqliteDocumentStore, StoreError,
    ValidationMode,
};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// A temporary directory holding an archive, a SQLite store and the skip log.
pub struct TestEnv {
    pub dir: TempDir,
    pub store: SqliteDocumentStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteDocumentStore::new(dir.path().join("calls.db")).unwrap();
        Self { dir, store }
    }

    pub fn skip_log_path(&self) -> PathBuf {
        self.dir.path().join("skipped_files.log")
    }

    pub fn scratch_root(&self) -> PathBuf {
        let root = self.dir.path().join("scratch");
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    /// Write `calls.zip` with the given `(entry name, content)` pairs.
    pub fn write_archive(&self, entries: &[(&str, &str)]) -> PathBuf {
        write_zip(&self.dir.path().join("calls.zip"), entries)
    }

    /// A driver over this env's store, skip log and scratch directory.
    pub fn driver<'a>(&self, store: &'a dyn DocumentStore, mode: ValidationMode) -> BatchDriver<'a> {
        BatchDriver::new(CallSink::new(store, COLLECTION), RecordValidator::new(mode))
            .with_scratch_root(Some(self.scratch_root()))
            .with_skip_log(Some(self.skip_log_path()))
    }

    pub fn document(&self, id: &str) -> Option<Map<String, Value>> {
        self.store
            .get_document(COLLECTION, id)
            .unwrap()
            .map(|doc| doc.fields)
    }

    pub fn skip_log(&self) -> Option<String> {
        std::fs::read_to_string(self.skip_log_path()).ok()
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch_root()).unwrap().next().is_none()
    }
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path.to_path_buf()
}

/// Delegates to another store but refuses writes for some ids.
pub struct FlakyStore<'a> {
    pub inner: &'a dyn DocumentStore,
    pub failing_ids: Vec<String>,
}

impl DocumentStore for FlakyStore<'_> {
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        if self.failing_ids.iter().any(|f| f == id) {
            return Err(StoreError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.inner.set_document(collection, id, fields)
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get_document(collection, id)
    }

    fn list_documents(
        &self,
        collection: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        self.inner.list_documents(collection, page_size, page_token)
    }

    fn describe(&self) -> String {
        format!("flaky({})", self.inner.describe())
    }
}
