//! HTTP transport abstraction.
//!
//! The remote client talks to the API through the [`HttpClient`] trait so
//! that tests (and other runtimes) can substitute the network.
//! [`ReqwestHttpClient`] is the production implementation.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP method subset used by the remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// PATCH request.
    Patch,
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a PATCH request with a JSON body.
    pub fn patch(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Patch,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body.into()),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds headers; names are lowercased.
    #[must_use]
    pub fn with_headers<'a>(mut self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (name, value) in headers {
            self.headers
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP client abstraction.
///
/// Implementations return `Err` only for transport failures (DNS, connect,
/// TLS, timeout, unreadable body). Any response that arrived, whatever its
/// status, is `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Reqwest-based HTTP client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Creates a client with the given timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Network`] if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration, user_agent: &str) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| RemoteError::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };
        debug!(method = ?request.method, url = %request.url, "HTTP request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                e.to_string()
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_string(), s.to_string())))
            .collect();
        let body = response.text().await.map_err(|e| e.to_string())?;

        debug!(status, "HTTP response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builders() {
        let req = HttpRequest::patch("https://api.example.com/gists/1", "{}")
            .header("Authorization", "token abc");
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.header_value("AUTHORIZATION"), Some("token abc"));
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let resp = HttpResponse::new(200, "").with_headers([("X-OAuth-Scopes", "gist, repo")]);
        assert_eq!(resp.header("x-oauth-scopes"), Some("gist, repo"));
        assert!(resp.is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[tokio::test]
    async fn reqwest_client_builds() {
        let client = ReqwestHttpClient::new(Duration::from_secs(5), "tracksync-test");
        assert!(client.is_ok());
    }
}
