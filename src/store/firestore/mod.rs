//! Firestore backend over the REST API.

mod auth;
mod value;

pub use auth::ServiceAccountKey;

use super::{Document, DocumentPage, DocumentStore, StoreError};
use crate::config::StoreSettings;
use anyhow::{bail, Context, Result};
use auth::TokenSource;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::info;

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

pub struct FirestoreStore {
    client: Client,
    api_base: String,
    project_id: String,
    database: String,
    tokens: TokenSource,
}

#[derive(Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FirestoreStore {
    /// Build the client and mint a first token so bad credentials fail at startup.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()?;

        let (tokens, key_project) = match &settings.credentials_path {
            Some(path) => {
                let key = ServiceAccountKey::load(path)?;
                let project = key.project_id.clone();
                (TokenSource::service_account(key)?, Some(project))
            }
            None if settings.endpoint.is_some() => (TokenSource::Emulator, None),
            None => bail!("The firestore store needs a service account key (credentials_path)"),
        };

        let project_id = settings
            .project_id
            .clone()
            .or(key_project)
            .context("No Firestore project id configured")?;

        let api_base = match &settings.endpoint {
            Some(endpoint) => emulator_api_base(endpoint),
            None => FIRESTORE_API_BASE.to_string(),
        };

        let store = Self {
            client,
            api_base,
            project_id,
            database: settings
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            tokens,
        };
        store
            .tokens
            .bearer(&store.client)
            .context("Could not authenticate with Firestore")?;
        info!(
            "Authenticated with Firestore project {} at {}",
            store.project_id, store.api_base
        );
        Ok(store)
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.api_base,
            self.project_id,
            self.database,
            urlencoding::encode(collection)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), urlencoding::encode(id))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let token = self.tokens.bearer(&self.client)?;
        Ok(request.bearer_auth(token).send()?)
    }

    fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Auth(format!("{}: {}", status, message)));
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn into_document(rest: RestDocument) -> Result<Document, StoreError> {
        let id = document_id_from_name(&rest.name)
            .ok_or_else(|| StoreError::Malformed(format!("bad document name {}", rest.name)))?;
        Ok(Document {
            id,
            fields: value::decode_fields(&rest.fields)?,
        })
    }
}

impl DocumentStore for FirestoreStore {
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        // PATCH without an update mask replaces the document, creating it if needed.
        let body = json!({ "fields": value::encode_fields(fields) });
        let request = self.client.patch(self.document_url(collection, id)).json(&body);
        Self::check(self.send(request)?)?;
        Ok(())
    }

    fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let request = self.client.get(self.document_url(collection, id));
        let response = self.send(request)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let rest: RestDocument = Self::check(response)?.json()?;
        Self::into_document(rest).map(Some)
    }

    fn list_documents(
        &self,
        collection: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        let mut query: Vec<(&str, String)> = vec![
            ("pageSize", page_size.max(1).to_string()),
            ("orderBy", "__name__".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let request = self.client.get(self.collection_url(collection)).query(&query);
        let response: ListDocumentsResponse = Self::check(self.send(request)?)?.json()?;

        let documents = response
            .documents
            .into_iter()
            .map(Self::into_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentPage {
            documents,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn describe(&self) -> String {
        format!("firestore:{}/{}", self.project_id, self.database)
    }
}

/// The last path segment of `projects/p/databases/d/documents/collection/id`.
fn document_id_from_name(name: &str) -> Option<String> {
    let id = name.rsplit('/').next().filter(|id| !id.is_empty())?;
    urlencoding::decode(id).ok().map(|id| id.into_owned())
}

fn emulator_api_base(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let endpoint = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    if endpoint.ends_with("/v1") {
        endpoint
    } else {
        format!("{}/v1", endpoint)
    }
}
