use super::{Document, DocumentPage, DocumentStore, StoreError};
use crate::sqlite_column;
use crate::sqlite_persistence::{read_schema_version, SqlType, Table, VersionedSchema};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

const DOCUMENTS_TABLE_V1: Table = Table {
    name: "documents",
    columns: &[
        sqlite_column!("collection", &SqlType::Text, non_null = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("body", &SqlType::Text, non_null = true),
        sqlite_column!(
            "updated_at",
            &SqlType::Text,
            non_null = true,
            default_value = Some("(datetime('now'))")
        ),
    ],
    primary_key: &["collection", "id"],
    indices: &[],
};

pub const DOCUMENT_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[DOCUMENTS_TABLE_V1],
}];

/// Local document store on SQLite, one row per (collection, id) holding the
/// JSON body.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteDocumentStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open document database {:?}", path))?;
        let latest = DOCUMENT_VERSIONED_SCHEMAS
            .last()
            .context("No document schema defined")?;

        if is_new_db {
            info!("Creating new document database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let db_version = read_schema_version(&conn)
                .with_context(|| format!("{:?} is not a document database", path))?;
            let schema = DOCUMENT_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version)
                .with_context(|| format!("Unknown document database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Document database schema validation failed for version {}",
                    db_version
                )
            })?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_owned(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn parse_body(id: String, body: &str) -> Result<Document, StoreError> {
        match serde_json::from_str::<Value>(body)? {
            Value::Object(fields) => Ok(Document { id, fields }),
            _ => Err(StoreError::Malformed(format!("document {} is not an object", id))),
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(fields)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![collection, id, body],
        )?;
        Ok(())
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| Self::parse_body(id.to_string(), &body))
            .transpose()
    }

    fn list_documents(
        &self,
        collection: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        let page_size = page_size.max(1);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents WHERE collection = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(
                params![collection, page_token.unwrap_or(""), page_size as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<rusqlite::Result<_>>()?;

        let next_page_token = if rows.len() == page_size {
            rows.last().map(|(id, _)| id.clone())
        } else {
            None
        };
        let documents = rows
            .into_iter()
            .map(|(id, body)| Self::parse_body(id, &body))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentPage {
            documents,
            next_page_token,
        })
    }

    fn count_documents(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteDocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteDocumentStore::new(temp_dir.path().join("calls.db")).unwrap();
        (store, temp_dir)
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_set_and_get_document() {
        let (store, _temp_dir) = create_tmp_store();
        store
            .set_document("calls", "A1", &fields(json!({"agent": "Sam", "happy": 5})))
            .unwrap();

        let doc = store.get_document("calls", "A1").unwrap().unwrap();
        assert_eq!(doc.id, "A1");
        assert_eq!(doc.fields["agent"], json!("Sam"));
        assert!(store.get_document("calls", "A2").unwrap().is_none());
        assert!(store.get_document("other", "A1").unwrap().is_none());
    }

    #[test]
    fn test_set_replaces_whole_document() {
        let (store, _temp_dir) = create_tmp_store();
        store
            .set_document("calls", "A1", &fields(json!({"agent": "Sam", "sad": 1})))
            .unwrap();
        store
            .set_document("calls", "A1", &fields(json!({"agent": "Kim"})))
            .unwrap();

        assert_eq!(store.count_documents("calls").unwrap(), 1);
        let doc = store.get_document("calls", "A1").unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"agent": "Kim"})));
    }

    #[test]
    fn test_pagination_in_id_order() {
        let (store, _temp_dir) = create_tmp_store();
        for id in ["c", "a", "e", "b", "d"] {
            store.set_document("calls", id, &Map::new()).unwrap();
        }

        let first = store.list_documents("calls", 2, None).unwrap();
        let ids: Vec<_> = first.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(first.next_page_token.as_deref(), Some("b"));

        let all: Vec<_> = store
            .all_documents("calls")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(all, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_reopen_validates_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calls.db");
        {
            let store = SqliteDocumentStore::new(&path).unwrap();
            store.set_document("calls", "A1", &Map::new()).unwrap();
        }
        let store = SqliteDocumentStore::new(&path).unwrap();
        assert_eq!(store.count_documents("calls").unwrap(), 1);
    }

    #[test]
    fn test_refuses_foreign_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("foreign.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE documents (x TEXT)", []).unwrap();
        }
        assert!(SqliteDocumentStore::new(&path).is_err());
    }

    #[test]
    fn test_refuses_unknown_schema_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calls.db");
        drop(SqliteDocumentStore::new(&path).unwrap());
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                &format!("PRAGMA user_version = {}", crate::sqlite_persistence::BASE_DB_VERSION + 2),
                [],
            )
            .unwrap();
        }
        let err = SqliteDocumentStore::new(&path).err().unwrap();
        assert!(format!("{:#}", err).contains("Unknown document database version 2"));
    }
}
