//! Authenticated JSON request helper.
//!
//! Thin wrapper over reqwest shared by everything that talks to the
//! API with a session token: attaches the bearer header when a token is
//! present, serializes bodies as JSON, and parses responses leniently.
//! A 401 anywhere forces the session's invalidation side effect so
//! "session ended" has a single definition.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::session::{Session, classify_transport_error};

/// Authenticated API client bound to a session.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<Session>,
}

impl ApiClient {
    /// Creates a client against the configured API.
    pub fn new(config: &Config, session: Arc<Session>) -> anyhow::Result<Self> {
        let base_url = config.resolve_base_url()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    /// Issues a request and returns the parsed response body.
    ///
    /// Empty bodies parse as null; non-JSON bodies are kept as raw
    /// strings, matching the server's occasional plain-text responses.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(path);

        let mut builder = self.http.request(method.clone(), &url);
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            // Token no longer accepted anywhere: end the session.
            debug!("{} {} returned 401, invalidating session", method, path);
            self.session.force_invalidate();
            return Err(ApiError::unauthorized());
        }

        let text = response.text().await.map_err(classify_transport_error)?;
        if !status.is_success() {
            return Err(ApiError::http_status(status.as_u16(), &text));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// GET a path and deserialize the response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, path, None).await?;
        decode(path, value)
    }

    /// POST a JSON body and deserialize the response.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        let value = self.request(Method::POST, path, Some(body)).await?;
        decode(path, value)
    }

    /// PUT a JSON body, discarding the response body.
    pub async fn put(&self, path: &str, body: Value) -> Result<(), ApiError> {
        self.request(Method::PUT, path, Some(body)).await?;
        Ok(())
    }

    /// DELETE a path, discarding the response body.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::parse(format!("Failed to decode response from {}: {}", path, e)))
}
