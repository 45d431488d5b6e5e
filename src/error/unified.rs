//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    InsufficientQuota,
    RateLimitExceeded,
    InvalidRequest,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl ErrorCode {
    /// Map a provider `error.type`, `error.code` or RPC status string onto a
    /// known code.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "invalid_api_key" | "authentication_error" | "UNAUTHENTICATED"
            | "PERMISSION_DENIED" => Self::InvalidApiKey,
            "insufficient_quota" => Self::InsufficientQuota,
            "rate_limit_exceeded" | "rate_limit_error" | "RESOURCE_EXHAUSTED" => {
                Self::RateLimitExceeded
            }
            "invalid_request_error" | "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => {
                Self::InvalidRequest
            }
            "context_length_exceeded" => Self::ContextLengthExceeded,
            "server_error" | "INTERNAL" | "UNAVAILABLE" => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Quota,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolCall,
    Unknown,
}

/// Structured details returned by a provider API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub code: Option<ErrorCode>,
    pub provider_code: Option<String>,
    pub request_id: Option<String>,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    SwitchModel,
    ContactSupport,
}
