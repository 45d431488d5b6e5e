//! Generation requests, responses and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{ChatTurn, FunctionCall, Part};
use super::tool::ToolSpec;
use super::usage::Usage;

/// Per-request generation settings.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerateContentConfig {
    #[builder(into)]
    pub system_instruction: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// `application/json` switches the request to JSON mode.
    #[builder(into)]
    pub response_mime_type: Option<String>,
    pub response_json_schema: Option<serde_json::Value>,
}

impl GenerateContentConfig {
    pub fn is_json_mode(&self) -> bool {
        self.response_mime_type.as_deref() == Some("application/json")
    }
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateContentRequest {
    pub model: String,
    pub contents: Vec<ChatTurn>,
    #[serde(default)]
    pub config: GenerateContentConfig,
}

/// One canonical response; streaming produces many of these.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerateContentResponse {
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerateContentResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            ..Default::default()
        }
    }

    pub fn from_function_call(call: FunctionCall) -> Self {
        Self {
            parts: vec![Part::FunctionCall(call)],
            ..Default::default()
        }
    }

    pub fn finished(reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            parts: Vec::new(),
            finish_reason: Some(reason),
            usage,
        }
    }

    /// Concatenated text parts, or `None` when there are none.
    pub fn text(&self) -> Option<String> {
        let mut texts = self.parts.iter().filter_map(Part::as_text).peekable();
        texts.peek()?;
        Some(texts.collect())
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }

    pub fn thought(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Thought { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Parse both OpenAI-style and Gemini-style spellings.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" | "STOP" | "end_turn" => Self::Stop,
            "length" | "MAX_TOKENS" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" | "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"
            | "SPII" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}
