//! Grok provider (OpenAI-compatible chat completions via OpenRouter).

use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{
    DEFAULT_GROK_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_TEMPERATURE,
};
use crate::error::normalize::normalize;
use crate::error::{normalize_error, KestrelError, ProviderFailure};
use crate::tools::{chrome_navigation_instruction, filter_tools, ToolFilterConfig};
use crate::types::{
    ChatTurn, FinishReason, GenerateContentConfig, GenerateContentRequest,
    GenerateContentResponse, Usage,
};
use crate::util::timeout::with_timeout;
use crate::util::tokens::estimate_tokens;

use super::assembler::{assemble_stream, StreamAssembler};
use super::http::{bearer_headers, build_client, ensure_success, sse_data_stream};
use super::mapper::{
    function_call_part, map_history_to_wire_messages, map_tool_declarations_to_wire_tools,
};
use super::wire::{ChatCompletionRequest, ChatCompletionResponse, StreamChunk};
use super::{ContentGenerator, EmbedContentRequest, EmbedContentResponse, ResponseStream};

pub const MISSING_KEY_MESSAGE: &str = "No OpenRouter API key found. Please set GROK_API_KEY environment variable, or configure authentication via CLI settings. Get your API key from https://openrouter.ai/keys";

/// Prepended to the system instruction whenever tools are offered.
pub const TOOL_CALLING_INSTRUCTION: &str = r#"CRITICAL: You are in FUNCTION CALLING MODE. You MUST use the provided tools to perform actions.

STRICT RULES:
1. When asked to create/write files: IMMEDIATELY call write_file function - NO text responses
2. When asked to run commands: IMMEDIATELY call run_shell_command function - NO text responses
3. When asked to read files: IMMEDIATELY call read_file function - NO text responses
4. When asked to edit files: IMMEDIATELY call replace function - NO text responses
5. When asked to list directories: IMMEDIATELY call list_directory function - NO text responses

TOOL CALL FORMAT:
Use this XML format for tool calls:
<xai:function_call name="TOOL_NAME">
  <parameter name="PARAM_NAME">PARAM_VALUE</parameter>
</xai:function_call>

Example for creating files:
<xai:function_call name="write_file">
  <parameter name="file_path">/path/to/file.txt</parameter>
  <parameter name="content">File content here</parameter>
</xai:function_call>

FORBIDDEN BEHAVIORS:
- DO NOT write code in your response text
- DO NOT provide plans or explanations before using tools
- DO NOT ask for permission - JUST USE THE TOOLS
- DO NOT output example code blocks

YOU MUST RESPOND WITH TOOL CALLS, NOT TEXT. USE THE XML FORMAT SHOWN ABOVE."#;

const JSON_MODE_INSTRUCTION: &str = "You are a strict JSON generator. Respond ONLY with a single valid JSON object, no prose, no markdown fences.";

/// Construction options for [`GrokGenerator`].
#[derive(Debug, Clone, Builder)]
pub struct GrokOptions {
    #[builder(into)]
    pub model: String,
    /// Explicit key; when absent the environment is consulted per request.
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(into, default = DEFAULT_GROK_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(default = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))]
    pub timeout: Duration,
    #[builder(default)]
    pub tool_filter: ToolFilterConfig,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    #[builder(default = DEFAULT_MAX_OUTPUT_TOKENS)]
    pub max_output_tokens: u32,
}

pub struct GrokGenerator {
    options: GrokOptions,
    client: reqwest::Client,
}

impl GrokGenerator {
    pub fn new(options: GrokOptions) -> Result<Self, KestrelError> {
        let client = build_client(options.timeout)?;
        Ok(Self { options, client })
    }

    /// Resolve the API key: explicit, then `GROK_API_KEY`, then `XAI_API_KEY`.
    fn resolve_api_key(&self) -> Result<String, KestrelError> {
        let from_env = |var: &str| std::env::var(var).ok().filter(|k| !k.is_empty());
        self.options
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| from_env("GROK_API_KEY"))
            .or_else(|| from_env("XAI_API_KEY"))
            .ok_or_else(|| KestrelError::Authentication(MISSING_KEY_MESSAGE.to_string()))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.options.base_url.trim_end_matches('/')
        )
    }

    /// Build the chat completion body for `request`.
    ///
    /// Tools are compacted and then filtered by the selection policy before
    /// they are sent.
    pub fn build_request(&self, request: &GenerateContentRequest, stream: bool) -> ChatCompletionRequest {
        let config = &request.config;
        let json_mode = config.is_json_mode();

        let selection = map_tool_declarations_to_wire_tools(&config.tools)
            .map(|tools| filter_tools(&tools, &self.options.tool_filter));
        let has_chrome = selection.as_ref().is_some_and(|s| s.has_chrome());
        let tools = selection
            .map(|s| s.selected)
            .filter(|selected| !selected.is_empty());

        if let Some(tools) = &tools {
            debug!(
                count = tools.len(),
                names = ?tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
                "sending tools"
            );
        }

        let system = if json_mode {
            Some(json_mode_instruction(config))
        } else {
            enhanced_system_instruction(
                config.system_instruction.as_deref(),
                tools.is_some(),
                has_chrome,
            )
        };

        let model = if request.model.is_empty() {
            self.options.model.clone()
        } else {
            request.model.clone()
        };

        ChatCompletionRequest {
            model,
            messages: map_history_to_wire_messages(&request.contents, system.as_deref()),
            stream,
            temperature: config.temperature.unwrap_or(self.options.temperature),
            max_tokens: config
                .max_output_tokens
                .unwrap_or(self.options.max_output_tokens),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            response_format: json_mode.then(|| json!({ "type": "json_object" })),
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, KestrelError> {
        let api_key = self.resolve_api_key()?;
        let send = async {
            let resp = self
                .client
                .post(self.endpoint())
                .headers(bearer_headers(&api_key))
                .json(body)
                .send()
                .await?;
            Ok::<_, KestrelError>(resp)
        };
        let resp = with_timeout(self.options.timeout, send).await?;
        ensure_success(resp).await
    }

    async fn generate_inner(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, KestrelError> {
        let body = self.build_request(request, false);
        debug!(model = %body.model, messages = body.messages.len(), "Grok generate_content");

        let resp = self.send(&body).await?;
        let data: ChatCompletionResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| KestrelError::api(200, "No choices in Grok response"))?;

        let mut parts = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            let mut assembler = StreamAssembler::new();
            let mut responses = assembler.push(&StreamChunk::text(text));
            responses.extend(assembler.finish());
            parts.extend(responses.into_iter().flat_map(|r| r.parts));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            if call.kind == "function" && !call.function.name.is_empty() {
                parts.push(function_call_part(
                    &call.function.name,
                    &call.function.arguments,
                    Some(call.id),
                ));
            }
        }

        Ok(GenerateContentResponse {
            parts,
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
            usage: data.usage.map(Usage::from),
        })
    }

    async fn stream_inner(&self, request: &GenerateContentRequest) -> Result<ResponseStream, KestrelError> {
        let body = self.build_request(request, true);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "Grok generate_content_stream"
        );

        let resp = self.send(&body).await?;
        let chunks = sse_data_stream(resp).filter_map(|item| {
            futures::future::ready(match item {
                Ok(data) => parse_stream_data(&data),
                Err(e) => Some(Err(normalize(e))),
            })
        });
        Ok(assemble_stream(chunks))
    }
}

/// Parse one SSE payload.
///
/// An `error` object in the payload becomes a normalized error; payloads
/// that are not chunks are skipped.
fn parse_stream_data(data: &str) -> Option<Result<StreamChunk, KestrelError>> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream payload");
            return None;
        }
    };
    if let Some(error) = value.get("error") {
        return Some(Err(normalize_error(&ProviderFailure::from_json(error))));
    }
    match serde_json::from_value::<StreamChunk>(value) {
        Ok(chunk) => Some(Ok(chunk)),
        Err(e) => {
            debug!(error = %e, "skipping malformed stream chunk");
            None
        }
    }
}

fn enhanced_system_instruction(
    system: Option<&str>,
    has_tools: bool,
    has_chrome: bool,
) -> Option<String> {
    let system = system.filter(|s| !s.is_empty());
    if !has_tools {
        return system.map(str::to_string);
    }
    let mut out = TOOL_CALLING_INSTRUCTION.to_string();
    out.push_str(chrome_navigation_instruction(has_chrome));
    if let Some(system) = system {
        out.push_str("\n\n");
        out.push_str(system);
    }
    Some(out)
}

fn json_mode_instruction(config: &GenerateContentConfig) -> String {
    let mut out = JSON_MODE_INSTRUCTION.to_string();
    if let Some(schema) = &config.response_json_schema {
        out.push_str("\nJSON schema (for guidance only):\n");
        out.push_str(&schema.to_string());
    }
    if let Some(system) = config.system_instruction.as_deref().filter(|s| !s.is_empty()) {
        out.push_str("\n\nAdditional instructions:\n");
        out.push_str(system);
    }
    out
}

#[async_trait]
impl ContentGenerator for GrokGenerator {
    fn provider_name(&self) -> &str {
        "grok"
    }

    fn model_id(&self) -> &str {
        &self.options.model
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<GenerateContentResponse, KestrelError> {
        self.generate_inner(request).await.map_err(normalize)
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError> {
        self.stream_inner(request).await.map_err(normalize)
    }

    async fn count_tokens(&self, contents: &[ChatTurn]) -> Result<u32, KestrelError> {
        let text = serde_json::to_string(contents)?;
        Ok(estimate_tokens(&text))
    }

    async fn embed_content(
        &self,
        _request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, KestrelError> {
        Err(KestrelError::UnsupportedOperation(
            "Grok embeddings not implemented".to_string(),
        ))
    }
}
