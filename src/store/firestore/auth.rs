//! OAuth access tokens for a Google service account (JWT bearer grant).

use crate::store::StoreError;
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a service account key file needed to mint tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid service account key {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut key: ServiceAccountKey = serde_json::from_str(content)?;
        // Keys pasted through environment or secret stores often carry escaped newlines.
        if !key.private_key.contains('\n') && key.private_key.contains("\\n") {
            key.private_key = key.private_key.replace("\\n", "\n");
        }
        Ok(key)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

pub enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
    /// The local emulator accepts this fixed token with admin rights.
    Emulator,
}

impl TokenSource {
    pub fn service_account(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM key")?;
        Ok(TokenSource::ServiceAccount {
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    /// Current bearer token, minting a new one when the cached one is about to expire.
    pub fn bearer(&self, client: &Client) -> Result<String, StoreError> {
        match self {
            TokenSource::Emulator => Ok("owner".to_string()),
            TokenSource::ServiceAccount {
                key,
                encoding_key,
                cached,
            } => {
                let now = Utc::now().timestamp();
                let mut cached = cached.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(token) = cached.as_ref() {
                    if token.expires_at - EXPIRY_MARGIN_SECS > now {
                        return Ok(token.value.clone());
                    }
                }
                let token = request_token(client, key, encoding_key, now)?;
                let value = token.value.clone();
                *cached = Some(token);
                Ok(value)
            }
        }
    }
}

fn request_token(
    client: &Client,
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
    now: i64,
) -> Result<CachedToken, StoreError> {
    let claims = Claims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let assertion = jsonwebtoken::encode(&header, &claims, encoding_key)
        .map_err(|e| StoreError::Auth(format!("cannot sign assertion: {}", e)))?;

    debug!("Requesting access token for {}", key.client_email);
    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(StoreError::Auth(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }
    let token: TokenResponse = response.json()?;
    Ok(CachedToken {
        value: token.access_token,
        expires_at: now + token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
    })
}
