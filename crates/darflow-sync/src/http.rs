//! Shared plumbing for the Google REST clients.

use darflow_store::StoreError;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl From<SyncError> for StoreError {
    fn from(e: SyncError) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// Bearer-authenticated HTTP client shared by the Sheets and Drive clients.
#[derive(Clone)]
pub struct GoogleAuth {
    pub(crate) client: reqwest::Client,
    token: String,
}

impl GoogleAuth {
    /// `token` is an OAuth access token with Drive and Sheets scopes.
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).bearer_auth(&self.token)
    }

    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url).bearer_auth(&self.token)
    }

    pub(crate) fn put(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.put(url).bearer_auth(&self.token)
    }
}

/// Send, fail on non-2xx with the body attached, decode JSON.
pub(crate) async fn send_json<T: DeserializeOwned>(
    req: reqwest::RequestBuilder,
) -> Result<T, SyncError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Server {
            status: status.as_u16(),
            body,
        });
    }
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
