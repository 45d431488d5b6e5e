//! HTTP client construction, SSE parsing, and auth headers.

use std::time::Duration;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{normalize_error, KestrelError, ProviderFailure};

/// Build a reqwest client that gives up on a silent connection after `timeout`.
///
/// The wait for response headers is bounded separately with
/// [`with_timeout`](crate::util::timeout::with_timeout); a streamed body may
/// run longer than `timeout` as long as bytes keep arriving.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, KestrelError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(KestrelError::Network)
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build headers for the Google API (`x-goog-api-key`).
pub fn google_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-goog-api-key", val);
    }
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]".
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

fn is_done(line: &str) -> bool {
    line.strip_prefix("data:").map(str::trim) == Some("[DONE]")
}

/// Turn a non-success response into a normalized error.
pub fn status_to_error(status: u16, body: &str) -> KestrelError {
    match normalize_error(&ProviderFailure::from_http(status, body)) {
        KestrelError::RateLimited { message, .. } => KestrelError::RateLimited {
            message,
            retry_after_ms: extract_retry_after(body),
        },
        other => other,
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Check the status of a response, draining the body into an error on failure.
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, KestrelError> {
    let status = resp.status().as_u16();
    if resp.status().is_success() {
        return Ok(resp);
    }
    let body_text = resp.text().await.unwrap_or_default();
    Err(status_to_error(status, &body_text))
}

/// Split a response body into SSE `data:` payloads.
pub fn sse_data_stream(resp: reqwest::Response) -> BoxStream<'static, Result<String, KestrelError>> {
    sse_data_lines(resp.bytes_stream().map(|chunk| chunk.map_err(KestrelError::Network)))
}

/// Split raw body chunks into SSE `data:` payloads.
///
/// Lines are decoded only once complete, so a multi-byte character split
/// across chunks survives. Comment and blank lines are dropped; the `[DONE]`
/// sentinel ends the stream. An error is yielded once and ends the stream.
pub fn sse_data_lines<S, B>(chunks: S) -> BoxStream<'static, Result<String, KestrelError>>
where
    S: Stream<Item = Result<B, KestrelError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(chunks);

        while let Some(chunk_result) = chunks.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            buffer.extend_from_slice(chunk.as_ref());

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let decoded = String::from_utf8_lossy(&raw);
                let line = decoded.trim();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if is_done(line) {
                    return;
                }
                if let Some(data) = parse_sse_data(line) {
                    yield Ok(data.to_string());
                }
            }
        }

        let tail = String::from_utf8_lossy(&buffer);
        if let Some(data) = parse_sse_data(tail.trim()) {
            yield Ok(data.to_string());
        }
    };

    Box::pin(stream)
}
