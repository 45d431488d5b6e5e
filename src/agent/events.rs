//! Events emitted by a turn.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::KestrelError;
use crate::types::{FinishReason, ToolCallRequest, ToolCallResponse};

/// A reasoning summary of the form `**subject** description`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ThoughtSummary {
    pub subject: String,
    pub description: String,
}

impl ThoughtSummary {
    /// Split raw thought text into its bold subject and the remaining text.
    pub fn parse(raw: &str) -> Self {
        let Some(start) = raw.find("**") else {
            return Self {
                subject: String::new(),
                description: raw.trim().to_string(),
            };
        };
        let after_open = start + 2;
        let Some(len) = raw[after_open..].find("**") else {
            return Self {
                subject: String::new(),
                description: raw.trim().to_string(),
            };
        };
        let end = after_open + len;
        let mut description = String::with_capacity(raw.len());
        description.push_str(&raw[..start]);
        description.push_str(&raw[end + 2..]);
        Self {
            subject: raw[after_open..end].trim().to_string(),
            description: description.trim().to_string(),
        }
    }
}

/// Error payload surfaced to the caller instead of an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&KestrelError> for StructuredError {
    fn from(err: &KestrelError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompressionInfo {
    pub original_token_count: u32,
    pub new_token_count: u32,
}

/// Everything a turn can report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StreamEvent {
    Content(String),
    Thought(ThoughtSummary),
    ToolCallRequest(ToolCallRequest),
    ToolCallResponse(ToolCallResponse),
    UserCancelled,
    Error(StructuredError),
    ChatCompressed(Option<ChatCompressionInfo>),
    Finished(FinishReason),
    MaxSessionTurns,
    LoopDetected,
}

/// Lifecycle of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default)]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    #[default]
    NotStarted,
    Streaming,
    Cancelled,
    Errored,
    Finished,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Errored | Self::Finished)
    }
}
