//! services/learner/src/adapters/http.rs
//!
//! The shared HTTP plumbing used by every backend adapter: base URL handling,
//! bearer authentication and the mapping from HTTP statuses to `PortError`.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use vocab_core::domain::CredentialToken;
use vocab_core::ports::{PortError, PortResult};

//=========================================================================================
// The Shared Client
//=========================================================================================

/// A thin wrapper around `reqwest::Client` bound to one backend base URL.
/// Cloning is cheap; all adapters share the same connection pool.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a new `BackendClient` with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Joins a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Adds the bearer header for an authenticated call.
    pub fn authorized(request: RequestBuilder, token: &CredentialToken) -> RequestBuilder {
        request.bearer_auth(token.expose())
    }

    /// Sends the request and decodes a JSON body, classifying failures.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Backend responded with {}: {}", status, body);
            return Err(status_to_port_error(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response body: {}", e)))
    }

    /// Sends the request and discards the body on success.
    pub async fn send_empty(&self, request: RequestBuilder) -> PortResult<()> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Backend responded with {}: {}", status, body);
            return Err(status_to_port_error(status, &body));
        }
        Ok(())
    }
}

//=========================================================================================
// Error Classification
//=========================================================================================

/// FastAPI reports failures as `{"detail": "..."}`, or a list of validation
/// issues for 422s.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn detail_from_body(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Maps a non-success HTTP status to the port-level error it represents.
pub fn status_to_port_error(status: StatusCode, body: &str) -> PortError {
    let detail = detail_from_body(body);
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::FORBIDDEN => PortError::Forbidden(detail),
        StatusCode::NOT_FOUND => PortError::NotFound(detail),
        s if s.is_client_error() => PortError::Rejected(detail),
        s => PortError::Unexpected(format!("{}: {}", s, detail)),
    }
}

fn map_transport_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Unexpected("Backend request timed out".to_string())
    } else {
        PortError::Unexpected(err.to_string())
    }
}
