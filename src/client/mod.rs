//! HTTP client for the examroom API.
//!
//! GET requests go through a [`RequestDeduplicator`], so identical reads
//! issued while one is outstanding (or shortly after it finished) share a
//! single round trip. Writes are always sent.

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::dedup::{DedupSettings, RequestDeduplicator, SharedError};

/// Error type for API client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx response.
    #[error("HTTP status {status} with body: {body}")]
    Status { status: u16, body: String },

    /// Transport or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login succeeded at the HTTP level but returned no token.
    #[error("login response carried no token: {body}")]
    MissingToken { body: String },

    /// Failure of a deduplicated request, shared by every caller.
    #[error("{0}")]
    Shared(SharedError),
}

impl ClientError {
    /// HTTP status of a non-2xx response, looking through shared failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::MissingToken { .. } => None,
            ClientError::Shared(shared) => shared
                .downcast_ref::<ClientError>()
                .and_then(ClientError::status),
        }
    }
}

impl From<SharedError> for ClientError {
    fn from(err: SharedError) -> Self {
        ClientError::Shared(err)
    }
}

/// Result of [`ApiClient::login`].
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    /// The `user` object returned by the server
    pub user: Value,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    dedup: RequestDeduplicator<Value>,
}

impl ApiClient {
    /// Client for the server at `base_url` (e.g. `http://127.0.0.1:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_settings(base_url, DedupSettings::default())
    }

    pub fn with_settings(base_url: impl Into<String>, settings: DedupSettings) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            token: None,
            dedup: RequestDeduplicator::new(settings),
        }
    }

    /// Switch identity. The client gets its own deduplicator so cached reads
    /// never cross between tokens, including between clones.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.dedup = RequestDeduplicator::new(self.dedup.settings());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The deduplicator shared by this client and its clones.
    pub fn deduplicator(&self) -> &RequestDeduplicator<Value> {
        &self.dedup
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Log in and keep the returned token for later requests.
    ///
    /// Reads cached under the previous identity are left behind with a fresh
    /// deduplicator. A response without a token is an error.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResult, ClientError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response = self.post("auth/login", &body).await?;

        let token = match response.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return Err(ClientError::MissingToken {
                    body: response.to_string(),
                })
            }
        };
        let user = response.get("user").cloned().unwrap_or(Value::Null);

        self.token = Some(token.clone());
        self.dedup = RequestDeduplicator::new(self.dedup.settings());
        tracing::debug!(username, "Logged in");

        Ok(LoginResult { token, user })
    }

    /// Deduplicated GET. `params` (a JSON object) is sent as the query string.
    pub async fn get(&self, path: &str, params: Option<&Value>) -> Result<Value, ClientError> {
        let url = self.url(path);
        let query = query_pairs(params);
        let request = self.authorized(self.http.get(&url)).query(&query);

        let value = self
            .dedup
            .call("GET", &url, params, move || async move {
                let response = request.send().await?;
                Ok::<_, anyhow::Error>(read_json(response).await?)
            })
            .await?;
        Ok(value)
    }

    /// POST a JSON body. Never deduplicated.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let response = self
            .authorized(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// DELETE a resource. Never deduplicated.
    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        let response = self
            .authorized(self.http.delete(self.url(path)))
            .send()
            .await?;
        read_json(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

/// Flatten a JSON object into query pairs. Strings are sent bare, other
/// values as JSON; nulls are skipped.
fn query_pairs(params: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = params else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
