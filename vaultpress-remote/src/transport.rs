//! Raw HTTP seam under the GitHub store.
//!
//! [`HttpTransport`] sends one request and returns whatever came back,
//! including non-success statuses. Retry, gating and status interpretation
//! live above it so that a scripted transport can stand in during tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The API's `message` field when the body is a JSON error, otherwise
    /// the body text, truncated.
    pub fn error_message(&self) -> String {
        #[derive(serde::Deserialize)]
        struct ApiError {
            message: String,
        }
        if let Ok(err) = serde_json::from_slice::<ApiError>(&self.body) {
            return err.message;
        }
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError>;
}

// ---------------------------------------------------------------------------
// reqwest
// ---------------------------------------------------------------------------

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpTransport`] over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.bytes().await?.to_vec();
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
    fn response_headers_are_case_insensitive() {
        let resp = HttpResponse::new(429, "").with_header("Retry-After", "7");
        assert_eq!(resp.header("retry-after"), Some("7"));
        assert_eq!(resp.header("RETRY-AFTER"), Some("7"));
    }

    #[test]
    fn error_message_prefers_api_message() {
        let resp = HttpResponse::new(409, r#"{"message":"sha does not match"}"#);
        assert_eq!(resp.error_message(), "sha does not match");
        let plain = HttpResponse::new(502, "Bad Gateway");
        assert_eq!(plain.error_message(), "Bad Gateway");
    }

    #[test]
    fn request_header_lookup() {
        let req = HttpRequest {
            method: Method::Get,
            url: "https://example.test".into(),
            headers: vec![("Authorization".into(), "Bearer t".into())],
            body: None,
        };
        assert_eq!(req.header("authorization"), Some("Bearer t"));
        assert_eq!(req.method.as_str(), "GET");
    }
}
