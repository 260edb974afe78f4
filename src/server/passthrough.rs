//! Direct playback passthrough: `/<identifier>/videoplayback`.
//!
//! Instead of relaying through a pipeline, the stream's direct playback URL
//! is resolved with the fetcher's metadata dump and a single upstream fetch
//! is proxied back. Upstream URLs expire, so headers that would let the
//! browser cache them are dropped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Method, Response};
use serde::Deserialize;
use streamgate_common::{Error, Result, StreamAddress};
use tokio::process::Command;

/// Final path segment that selects passthrough.
pub const PASSTHROUGH_SEGMENT: &str = "videoplayback";

/// Upstream headers that are not forwarded: caching and CORS headers that
/// would pin an expiring URL, plus hop-by-hop headers.
fn is_excluded(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "cross-origin-resource-policy"
            | "accept-ranges"
            | "cache-control"
            | "expires"
            | "connection"
            | "transfer-encoding"
            | "keep-alive"
    )
}

/// Resolves a stream address to a direct playback URL.
#[async_trait::async_trait]
pub trait PlaybackResolver: Send + Sync {
    async fn resolve(&self, address: &StreamAddress) -> Result<String>;
}

/// Resolves playback URLs with a youtube-dl compatible metadata dump.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(program: PathBuf, extra_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            extra_args,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl PlaybackResolver for YtDlpResolver {
    async fn resolve(&self, address: &StreamAddress) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--dump-single-json", "--no-warnings"])
            .args(&self.extra_args)
            .arg("--")
            .arg(address.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::upstream(format!("failed to run metadata lookup: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::upstream(format!("metadata lookup timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::upstream(format!("metadata lookup failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::upstream(format!(
                "metadata lookup exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let metadata: Metadata = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::upstream(format!("unreadable metadata: {e}")))?;

        select_format(&metadata)
            .map(str::to_string)
            .ok_or_else(|| Error::upstream("no https format available"))
    }
}

/// The part of the fetcher's metadata dump used for format selection.
#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub formats: Vec<Format>,
}

#[derive(Debug, Deserialize)]
pub struct Format {
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub height: Option<u32>,
}

/// Pick the tallest format delivered over plain https.
pub fn select_format(metadata: &Metadata) -> Option<&str> {
    metadata
        .formats
        .iter()
        .filter(|f| f.protocol.as_deref() == Some("https"))
        .filter_map(|f| f.url.as_deref().map(|url| (f.height.unwrap_or(0), url)))
        // max_by_key keeps the last of equal heights; prefer the first listed
        .rev()
        .max_by_key(|(height, _)| *height)
        .map(|(_, url)| url)
}

/// Fetch `url` once and stream the upstream response back.
///
/// The upstream status is forwarded as-is; only transport failures are
/// errors.
pub async fn proxy(
    client: &reqwest::Client,
    method: &Method,
    url: &str,
    request_headers: &HeaderMap,
) -> Result<Response<Body>> {
    let mut upstream = if *method == Method::HEAD {
        client.head(url)
    } else {
        client.get(url)
    };
    if let Some(range) = request_headers.get(header::RANGE) {
        upstream = upstream.header(header::RANGE, range.clone());
    }

    let upstream = upstream
        .send()
        .await
        .map_err(|e| Error::upstream(format!("request to upstream failed: {e}")))?;

    tracing::debug!(status = %upstream.status(), "Upstream answered");

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in upstream.headers() {
            if !is_excluded(name) {
                headers.append(name.clone(), value.clone());
            }
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| Error::upstream(format!("invalid upstream response: {e}")))
}
