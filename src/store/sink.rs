use super::{DocumentStore, StoreError};
use crate::record::CanonicalRecord;
use tracing::debug;

/// Writes canonical call records into one collection of a document store.
pub struct CallSink<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
}

impl<'a> CallSink<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create or overwrite the document keyed by the record identifier.
    pub fn upsert(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        let id = record.identifier();
        self.store
            .set_document(&self.collection, id, &record.to_document())?;
        debug!("Stored {}/{}", self.collection, id);
        Ok(())
    }
}
