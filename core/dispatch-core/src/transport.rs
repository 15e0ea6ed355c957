//! Request/response transport to the backend REST API.
//!
//! Everything above this module talks to a [`Transport`], so the flows can be
//! exercised with a scripted transport in tests. [`HttpTransport`] is the
//! production implementation.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, COOKIE};
use serde_json::Value;
use std::fmt;

use crate::config::ClientConfig;
use crate::error::{DispatchError, Result};

const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A response that made it back from the server, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Value::Null` for an empty body.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the server's answer.
///
/// Only failures to obtain an answer at all (connect, timeout, unreadable
/// body) are errors here; HTTP error statuses come back as `ApiResponse`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).execute(request)
    }
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| DispatchError::Transport {
                path: config.api_url.clone(),
                details: format!("failed to build HTTP client: {}", err),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let request_id = ulid::Ulid::new().to_string();
        let url = self.url(&request.path);
        let transport_error = |details: String| DispatchError::Transport {
            path: request.path.clone(),
            details,
        };

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
        }
        .header(ACCEPT, "application/json")
        .header(REQUEST_ID_HEADER, request_id.as_str());

        if let Some(cookie) = self.session_cookie.as_deref() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        tracing::debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            "Sending API request"
        );

        let response = builder
            .send()
            .map_err(|err| transport_error(err.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|err| transport_error(format!("failed to read body: {}", err)))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|err| DispatchError::Json {
                context: format!("{} {} (HTTP {})", request.method, request.path, status),
                source: err,
            })?
        };

        tracing::debug!(
            request_id = %request_id,
            status,
            path = %request.path,
            "API response received"
        );

        Ok(ApiResponse { status, body })
    }
}
