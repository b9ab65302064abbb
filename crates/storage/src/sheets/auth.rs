//! OAuth2 access tokens for the Sheets API.
//!
//! Service-account keys are exchanged for short-lived bearer tokens with the
//! JWT-bearer grant; tokens are cached until shortly before they expire.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::repository::StorageError;

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

/// Service-account key as downloaded from the cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// How requests to the Sheets API are authorized.
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    /// A token obtained elsewhere, used as is.
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

pub(crate) struct Authenticator {
    http: Client,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub(crate) fn new(http: Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, exchanging the service-account key when the cached one is stale.
    pub(crate) async fn access_token(&self) -> Result<String, StorageError> {
        let key = match &self.credentials {
            Credentials::Bearer(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.refresh_at > now) {
            return Ok(token.value.clone());
        }

        let assertion = sign_assertion(key, now)?;
        tracing::debug!(client_email = %key.client_email, "requesting access token");
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StorageError::RateLimited);
        }
        if status.is_server_error() {
            return Err(StorageError::Unavailable(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;
        let lifetime = body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: now + Duration::seconds((lifetime - REFRESH_MARGIN_SECS).max(0)),
        });
        Ok(body.access_token)
    }
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, StorageError> {
    let iat = now.timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);

    // Keys pasted into TOML/env often carry literal `\n` sequences.
    let pem = key.private_key.replace("\\n", "\n");
    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| StorageError::Auth(format!("invalid service account key: {e}")))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| StorageError::Auth(format!("cannot sign assertion: {e}")))
}
