//! [`RemoteStore`] over the GitHub repository contents API.
//!
//! Every HTTP attempt passes through the shared [`RequestGate`] and the
//! [`RetryPolicy`]; writes are skipped when the remote blob digest already
//! matches the local bytes.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use vaultpress_core::RemoteConfig;

use crate::digest::blob_sha;
use crate::error::{RemoteError, Result};
use crate::gate::RequestGate;
use crate::retry::RetryPolicy;
use crate::store::{RemoteEntry, RemoteFile, RemoteStore, UploadResult};
use crate::transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, DEFAULT_TIMEOUT,
};

pub const USER_AGENT: &str = "vaultpress";
pub const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";

pub struct GitHubStore<T = ReqwestTransport> {
    transport: T,
    config: RemoteConfig,
    gate: RequestGate,
    retry: RetryPolicy,
}

impl GitHubStore<ReqwestTransport> {
    /// Store backed by a real HTTP client.
    pub fn connect(config: RemoteConfig, gate: RequestGate) -> Result<Self> {
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT)?;
        Ok(Self::with_transport(config, transport, gate))
    }
}

impl<T: HttpTransport> GitHubStore<T> {
    pub fn with_transport(config: RemoteConfig, transport: T, gate: RequestGate) -> Self {
        Self {
            transport,
            config,
            gate,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path}`, each path segment
    /// percent-encoded.
    fn contents_url(&self, path: &str, with_ref: bool) -> Result<String> {
        let base = &self.config.api_base;
        let mut url = Url::parse(base).map_err(|e| RemoteError::InvalidUrl(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .extend([
                "repos",
                self.config.owner.as_str(),
                self.config.repo.as_str(),
                "contents",
            ])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        if with_ref {
            url.query_pairs_mut().append_pair("ref", &self.config.branch);
        }
        Ok(url.into())
    }

    fn headers(&self, accept: &str, has_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), accept.to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ];
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if has_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        path: &str,
    ) -> Result<HttpResponse> {
        self.send_as(ACCEPT, method, url, body, path).await
    }

    /// One logical request: gated attempts under the retry policy.
    async fn send_as(
        &self,
        accept: &str,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        path: &str,
    ) -> Result<HttpResponse> {
        let request = HttpRequest {
            method,
            headers: self.headers(accept, body.is_some()),
            url,
            body,
        };
        let gate = &self.gate;
        let transport = &self.transport;
        let request = &request;
        self.retry
            .run(path, || async move {
                let _permit = gate.acquire().await?;
                tracing::trace!(method = request.method.as_str(), url = %request.url, "request");
                transport.send(request.clone()).await
            })
            .await
    }

    async fn fetch(&self, path: &str) -> Result<Option<Contents>> {
        let url = self.contents_url(path, true)?;
        let resp = self.send(Method::Get, url, None, path).await?;
        if resp.status == 404 {
            return Ok(None);
        }
        if !resp.is_success() {
            return Err(status_error(&resp, path));
        }
        serde_json::from_slice(&resp.body)
            .map(Some)
            .map_err(|e| structural(path, format!("unreadable contents response: {e}")))
    }

    /// Raw bytes of a file too large for inline `content`, checked against
    /// the digest from the metadata response.
    async fn fetch_raw(&self, path: &str, sha: &str) -> Result<Vec<u8>> {
        let url = self.contents_url(path, true)?;
        let resp = self.send_as(ACCEPT_RAW, Method::Get, url, None, path).await?;
        if !resp.is_success() {
            return Err(status_error(&resp, path));
        }
        if blob_sha(&resp.body) != sha {
            return Err(structural(path, "raw content does not match its sha"));
        }
        Ok(resp.body)
    }
}

#[async_trait]
impl<T: HttpTransport> RemoteStore for GitHubStore<T> {
    async fn read(&self, path: &str) -> Result<Option<RemoteFile>> {
        let body = match self.fetch(path).await? {
            None => return Ok(None),
            Some(Contents::Dir(_)) => return Err(structural(path, "path is a directory")),
            Some(Contents::File(body)) => body,
        };
        let sha = body.sha.ok_or_else(|| structural(path, "response has no sha"))?;
        let cleaned: String = body.content.split_whitespace().collect();
        let content = if !cleaned.is_empty() {
            STANDARD.decode(cleaned)?
        } else if body.size > 0 {
            // files over 1 MB come back without inline content
            tracing::debug!(path, size = body.size, "fetching raw content");
            self.fetch_raw(path, &sha).await?
        } else {
            Vec::new()
        };
        Ok(Some(RemoteFile {
            path: path.to_string(),
            sha,
            content,
        }))
    }

    async fn digest(&self, path: &str) -> Result<Option<String>> {
        match self.fetch(path).await? {
            None => Ok(None),
            Some(Contents::Dir(_)) => Err(structural(path, "path is a directory")),
            Some(Contents::File(body)) => body
                .sha
                .map(Some)
                .ok_or_else(|| structural(path, "response has no sha")),
        }
    }

    async fn write(&self, path: &str, content: &[u8], message: &str) -> Result<UploadResult> {
        let local = blob_sha(content);
        let existing = self.digest(path).await?;
        if existing.as_deref() == Some(local.as_str()) {
            tracing::debug!(path, sha = %local, "unchanged, skipping upload");
            return Ok(UploadResult {
                uploaded: false,
                sha: local,
                path: path.to_string(),
            });
        }

        let body = PutBody {
            message,
            content: STANDARD.encode(content),
            branch: &self.config.branch,
            sha: existing.as_deref(),
        };
        let url = self.contents_url(path, false)?;
        let resp = self
            .send(Method::Put, url, Some(serde_json::to_vec(&body)?), path)
            .await?;
        if !resp.is_success() {
            return Err(status_error(&resp, path));
        }

        let parsed: PutResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| structural(path, format!("unreadable write response: {e}")))?;
        let sha = parsed
            .content
            .and_then(|c| c.sha)
            .ok_or_else(|| structural(path, "response has no content.sha"))?;
        if sha != local {
            tracing::warn!(path, remote = %sha, local = %local, "remote digest differs from local");
        }
        tracing::info!(path, bytes = content.len(), created = existing.is_none(), "uploaded");
        Ok(UploadResult {
            uploaded: true,
            sha,
            path: path.to_string(),
        })
    }

    async fn delete(&self, path: &str, digest: &str, message: &str) -> Result<()> {
        let body = DeleteBody {
            message,
            sha: digest,
            branch: &self.config.branch,
        };
        let url = self.contents_url(path, false)?;
        let resp = self
            .send(Method::Delete, url, Some(serde_json::to_vec(&body)?), path)
            .await?;
        match resp.status {
            404 => {
                tracing::debug!(path, "already absent");
                Ok(())
            }
            _ if resp.is_success() => {
                tracing::info!(path, "deleted");
                Ok(())
            }
            _ => Err(status_error(&resp, path)),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        match self.fetch(path).await? {
            None => Ok(Vec::new()),
            Some(Contents::Dir(entries)) => Ok(entries),
            Some(Contents::File(_)) => Err(structural(path, "path is a file")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum Contents {
    Dir(Vec<RemoteEntry>),
    File(FileBody),
}

#[derive(Deserialize)]
struct FileBody {
    sha: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    size: u64,
}

#[derive(Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct PutResponse {
    content: Option<PutContent>,
}

#[derive(Deserialize)]
struct PutContent {
    sha: Option<String>,
}

fn structural(path: &str, reason: impl Into<String>) -> RemoteError {
    RemoteError::Structural {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn status_error(resp: &HttpResponse, path: &str) -> RemoteError {
    RemoteError::Status {
        status: resp.status,
        path: path.to_string(),
        message: resp.error_message(),
    }
}
