//! In-memory emulation of the GitHub contents API, as an [`HttpTransport`].
//!
//! Plug it into [`GitHubStore::with_transport`](crate::GitHubStore::with_transport)
//! to exercise the real request, retry and digest logic without a network.
//! Request counters, per-path fault injection and artificial latency let
//! tests observe idempotence, retries and gating.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Url;
use serde_json::{json, Value};

use crate::digest::blob_sha;
use crate::error::RemoteError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// A failure to return instead of handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 403 with an exhausted quota and no wait hint.
    RateLimited,
    /// 429 with `retry-after` in seconds.
    RetryAfter(u64),
    /// Connection-level error.
    Transport,
    /// 502.
    ServerError,
    /// Plain 403.
    Forbidden,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    faults: HashMap<String, VecDeque<Fault>>,
    always_rate_limited: bool,
    omit_put_sha: bool,
    inline_limit: Option<usize>,
    requests: usize,
    gets: usize,
    puts: usize,
    deletes: usize,
    put_paths: Vec<String>,
    in_flight: usize,
    peak_in_flight: usize,
}

#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<State>,
    latency: Duration,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request, to make concurrency observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn insert(&self, path: &str, content: Vec<u8>) {
        self.state().files.insert(path.to_string(), content);
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.remove(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.file(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    /// Fail the next `times` requests that touch `path`.
    pub fn fail(&self, path: &str, fault: Fault, times: usize) {
        let mut state = self.state();
        let queue = state.faults.entry(path.to_string()).or_default();
        queue.extend(std::iter::repeat(fault).take(times));
    }

    pub fn always_rate_limit(&self, on: bool) {
        self.state().always_rate_limited = on;
    }

    /// Answer successful writes without `content.sha`.
    pub fn omit_put_sha(&self, on: bool) {
        self.state().omit_put_sha = on;
    }

    /// Leave `content` empty for files larger than `limit` bytes, as the
    /// real API does above 1 MB; raw media-type requests still get the bytes.
    pub fn inline_limit(&self, limit: Option<usize>) {
        self.state().inline_limit = limit;
    }

    /// Every request received, including failed ones.
    pub fn requests(&self) -> usize {
        self.state().requests
    }

    pub fn gets(&self) -> usize {
        self.state().gets
    }

    pub fn puts(&self) -> usize {
        self.state().puts
    }

    pub fn deletes(&self) -> usize {
        self.state().deletes
    }

    /// Paths of handled PUTs, in arrival order.
    pub fn put_paths(&self) -> Vec<String> {
        self.state().put_paths.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state().peak_in_flight
    }

    pub fn reset_counters(&self) {
        let mut state = self.state();
        state.requests = 0;
        state.gets = 0;
        state.puts = 0;
        state.deletes = 0;
        state.put_paths.clear();
        state.peak_in_flight = 0;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, RemoteError> {
        let mut state = self.state();
        state.requests += 1;

        if request.header("authorization").is_none() {
            return Ok(error_response(401, "Requires authentication"));
        }
        let Some(path) = contents_path(&request.url) else {
            return Ok(error_response(404, "Not Found"));
        };
        if state.always_rate_limited {
            return Ok(error_response(429, "API rate limit exceeded"));
        }
        let fault = state.faults.get_mut(&path).and_then(VecDeque::pop_front);
        if let Some(fault) = fault {
            return match fault {
                Fault::RateLimited => Ok(error_response(403, "API rate limit exceeded")
                    .with_header("x-ratelimit-remaining", "0")),
                Fault::RetryAfter(secs) => Ok(error_response(429, "secondary rate limit")
                    .with_header("retry-after", secs.to_string())),
                Fault::Transport => Err(RemoteError::Transport("connection reset".into())),
                Fault::ServerError => Ok(error_response(502, "Bad Gateway")),
                Fault::Forbidden => Ok(error_response(403, "Resource not accessible")),
            };
        }

        match request.method {
            Method::Get => {
                state.gets += 1;
                let raw = request
                    .header("accept")
                    .is_some_and(|a| a.contains("raw"));
                Ok(get(&state, &path, raw))
            }
            Method::Put => {
                state.puts += 1;
                state.put_paths.push(path.clone());
                Ok(put(&mut state, &path, request.body.as_deref()))
            }
            Method::Delete => {
                state.deletes += 1;
                Ok(delete(&mut state, &path, request.body.as_deref()))
            }
        }
    }
}

#[async_trait]
impl HttpTransport for FakeGitHub {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        {
            let mut state = self.state();
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.handle(&request);
        self.state().in_flight -= 1;
        result
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn get(state: &State, path: &str, raw: bool) -> HttpResponse {
    if let Some(bytes) = state.files.get(path) {
        if raw {
            return HttpResponse::new(200, bytes.clone());
        }
        let inline = state.inline_limit.map_or(true, |limit| bytes.len() <= limit);
        return json_response(200, &file_json(path, bytes, inline));
    }

    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    let mut children: BTreeMap<String, Value> = BTreeMap::new();
    for (key, bytes) in state.files.range(prefix.clone()..) {
        let Some(rest) = key.strip_prefix(&prefix) else {
            break;
        };
        let (name, is_dir) = match rest.split_once('/') {
            Some((dir, _)) => (dir, true),
            None => (rest, false),
        };
        let child = format!("{prefix}{name}");
        let entry = if is_dir {
            json!({ "name": name, "path": child, "sha": blob_sha(child.as_bytes()), "type": "dir", "size": 0 })
        } else {
            json!({ "name": name, "path": child, "sha": blob_sha(bytes), "type": "file", "size": bytes.len() })
        };
        children.entry(name.to_string()).or_insert(entry);
    }

    if children.is_empty() {
        error_response(404, "Not Found")
    } else {
        json_response(200, &Value::Array(children.into_values().collect()))
    }
}

fn put(state: &mut State, path: &str, body: Option<&[u8]>) -> HttpResponse {
    let Some(body) = body.and_then(|b| serde_json::from_slice::<Value>(b).ok()) else {
        return error_response(400, "Problems parsing JSON");
    };
    let Some(content) = body
        .get("content")
        .and_then(Value::as_str)
        .and_then(|c| STANDARD.decode(c).ok())
    else {
        return error_response(422, "content is not valid Base64");
    };
    let supplied = body.get("sha").and_then(Value::as_str);

    let status = match (state.files.get(path), supplied) {
        (Some(_), None) => return error_response(422, "\"sha\" wasn't supplied."),
        (Some(current), Some(sha)) if blob_sha(current) != sha => {
            return error_response(409, &format!("{path} does not match {sha}"));
        }
        (Some(_), Some(_)) => 200,
        (None, _) => 201,
    };

    let sha = blob_sha(&content);
    state.files.insert(path.to_string(), content);

    let name = path.rsplit('/').next().unwrap_or(path);
    let content_json = if state.omit_put_sha {
        json!({ "name": name, "path": path })
    } else {
        json!({ "name": name, "path": path, "sha": sha })
    };
    json_response(
        status,
        &json!({ "content": content_json, "commit": { "sha": blob_sha(path.as_bytes()) } }),
    )
}

fn delete(state: &mut State, path: &str, body: Option<&[u8]>) -> HttpResponse {
    let supplied = body
        .and_then(|b| serde_json::from_slice::<Value>(b).ok())
        .and_then(|v| v.get("sha").and_then(Value::as_str).map(str::to_string));
    let Some(current) = state.files.get(path) else {
        return error_response(404, "Not Found");
    };
    match supplied {
        Some(sha) if sha == blob_sha(current) => {
            state.files.remove(path);
            json_response(200, &json!({ "content": null, "commit": { "sha": blob_sha(path.as_bytes()) } }))
        }
        Some(sha) => error_response(409, &format!("{path} does not match {sha}")),
        None => error_response(422, "\"sha\" wasn't supplied."),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn file_json(path: &str, bytes: &[u8], inline: bool) -> Value {
    if !inline {
        return json!({
            "type": "file",
            "encoding": "none",
            "size": bytes.len(),
            "name": path.rsplit('/').next().unwrap_or(path),
            "path": path,
            "sha": blob_sha(bytes),
            "content": "",
        });
    }
    // the real API wraps base64 at 60 columns
    let encoded = STANDARD.encode(bytes);
    let wrapped: Vec<String> = encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    json!({
        "type": "file",
        "encoding": "base64",
        "size": bytes.len(),
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "sha": blob_sha(bytes),
        "content": format!("{}\n", wrapped.join("\n")),
    })
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("content-type", "application/json")
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    json_response(status, &json!({ "message": message }))
}

/// Repository path addressed by a contents API URL, percent-decoded.
fn contents_path(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let mut segments = url.path_segments()?;
    segments.by_ref().find(|s| *s == "contents")?;
    let decoded: Vec<String> = segments
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .collect();
    Some(decoded.join("/"))
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
