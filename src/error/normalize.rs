//! Mapping of raw upstream failures onto user-facing errors.

use serde_json::Value;

use super::KestrelError;

pub const AUTH_FAILED_MESSAGE: &str =
    "Grok authentication failed - check your API key. Get one at https://openrouter.ai/keys";
pub const RATE_LIMITED_MESSAGE: &str =
    "Grok is taking a breather (rate limited). Try again in a moment.";
pub const UNAVAILABLE_MESSAGE: &str =
    "Cannot connect to Grok - the servers might be down. Please retry.";
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Grok quota exceeded - time to top up or switch to a different Grok model.";

/// The observable shape of an upstream failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderFailure {
    pub status: Option<i64>,
    pub error_type: Option<String>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: i64) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Read a failure from a loosely shaped JSON error object.
    ///
    /// The status is looked up in `status`, then `response.status`, then
    /// `code`; the first one holding a number (or numeric string) wins.
    pub fn from_json(value: &Value) -> Self {
        let status = [
            value.get("status"),
            value.get("response").and_then(|r| r.get("status")),
            value.get("code"),
        ]
        .into_iter()
        .flatten()
        .find_map(as_status);

        let error_type = value
            .get("error")
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| {
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
            .or_else(|| value.as_str().map(str::to_string))
            .unwrap_or_else(|| value.to_string());

        Self {
            status,
            error_type,
            message,
        }
    }

    /// Build a failure from an HTTP status and the raw response body.
    pub fn from_http(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        let error_type = error
            .and_then(|e| e.get("type").or_else(|| e.get("code")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let message = error
            .and_then(|e| e.get("message").and_then(Value::as_str).or_else(|| e.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.to_string()
                }
            });

        Self {
            status: Some(i64::from(status)),
            error_type,
            message,
        }
    }
}

impl From<&KestrelError> for ProviderFailure {
    fn from(err: &KestrelError) -> Self {
        match err {
            KestrelError::Api {
                status,
                message,
                details,
            } => Self {
                status: Some(i64::from(*status)),
                error_type: details.as_ref().and_then(|d| d.provider_code.clone()),
                message: message.clone(),
            },
            KestrelError::Network(e) => Self {
                status: e.status().map(|s| i64::from(s.as_u16())),
                error_type: None,
                message: e.to_string(),
            },
            other => Self::new(other.to_string()),
        }
    }
}

fn as_status(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Convert an upstream failure into a user-facing error.
///
/// Checks run in priority order: auth (401/403), rate limit (429), server
/// (5xx), quota (`insufficient_quota`). Anything else keeps its message.
pub fn normalize_error(failure: &ProviderFailure) -> KestrelError {
    match failure.status {
        Some(401) | Some(403) => {
            return KestrelError::Authentication(AUTH_FAILED_MESSAGE.to_string())
        }
        Some(429) => {
            return KestrelError::RateLimited {
                message: RATE_LIMITED_MESSAGE.to_string(),
                retry_after_ms: None,
            }
        }
        Some(s) if (500..600).contains(&s) => {
            return KestrelError::UpstreamUnavailable(UNAVAILABLE_MESSAGE.to_string())
        }
        _ => {}
    }

    if failure.error_type.as_deref() == Some("insufficient_quota") {
        return KestrelError::QuotaExceeded(QUOTA_EXCEEDED_MESSAGE.to_string());
    }

    KestrelError::Upstream(failure.message.clone())
}

/// Normalize an error raised while talking to the upstream.
///
/// Transport and API errors are reclassified; everything else, including
/// errors that were already normalized, is returned unchanged.
pub fn normalize(err: KestrelError) -> KestrelError {
    match err {
        KestrelError::Api { .. } | KestrelError::Network(_) => {
            normalize_error(&ProviderFailure::from(&err))
        }
        other => other,
    }
}
