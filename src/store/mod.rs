//! Keyed document storage for canonical call records.
//!
//! Documents are addressed by (collection, id). Writes replace the whole
//! document, reads are paginated in id order.

mod firestore;
mod sink;
mod sqlite_document_store;

pub use firestore::{FirestoreStore, ServiceAccountKey};
pub use sink::CallSink;
pub use sqlite_document_store::SqliteDocumentStore;

use crate::config::{StoreBackend, StoreSettings};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Store responded with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// Token to pass back for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub trait DocumentStore: Send + Sync {
    /// Creates the document, or fully replaces it when the id already exists.
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Returns None if the document does not exist.
    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Returns up to `page_size` documents ordered by id, starting after the
    /// position encoded in `page_token`.
    fn list_documents(
        &self,
        collection: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError>;

    /// Returns every document of the collection, following pagination.
    fn all_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_documents(collection, DEFAULT_PAGE_SIZE, token.as_deref())?;
            out.extend(page.documents);
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(out)
    }

    fn count_documents(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.all_documents(collection)?.len())
    }

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

/// Build the store selected by the settings. Failures here are fatal for the
/// caller: the database cannot be opened or the credentials are unusable.
pub fn open_store(settings: &StoreSettings) -> Result<Box<dyn DocumentStore>> {
    let store: Box<dyn DocumentStore> = match settings.backend {
        StoreBackend::Sqlite => {
            let path = settings
                .sqlite_path
                .as_ref()
                .context("The sqlite store needs a database path")?;
            Box::new(SqliteDocumentStore::new(path)?)
        }
        StoreBackend::Firestore => Box::new(FirestoreStore::from_settings(settings)?),
    };
    info!("Using document store {}", store.describe());
    Ok(store)
}
