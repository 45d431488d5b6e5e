//! Google Gemini API provider.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{DEFAULT_GOOGLE_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{ErrorCode, ErrorDetails, KestrelError};
use crate::types::{
    flatten_declarations, ChatTurn, FinishReason, FunctionCall, GenerateContentRequest,
    GenerateContentResponse, Part, Role, Usage,
};
use crate::util::timeout::with_timeout;

use super::http::{build_client, google_headers, sse_data_stream};
use super::{ContentGenerator, EmbedContentRequest, EmbedContentResponse, ResponseStream};

const MISSING_KEY_MESSAGE: &str =
    "No Google API key found. Please set GOOGLE_API_KEY or GEMINI_API_KEY.";

pub struct GoogleGenerator {
    model: String,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GoogleGenerator {
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, KestrelError> {
        let timeout = timeout.unwrap_or(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));
        Ok(Self {
            model: model.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_GOOGLE_BASE_URL.to_string()),
            timeout,
            client: build_client(timeout)?,
        })
    }

    fn resolve_api_key(&self) -> Result<String, KestrelError> {
        let from_env = |var: &str| std::env::var(var).ok().filter(|k| !k.is_empty());
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| from_env("GOOGLE_API_KEY"))
            .or_else(|| from_env("GEMINI_API_KEY"))
            .ok_or_else(|| KestrelError::Authentication(MISSING_KEY_MESSAGE.to_string()))
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn model_for<'a>(&'a self, request: &'a GenerateContentRequest) -> &'a str {
        if request.model.is_empty() {
            &self.model
        } else {
            &request.model
        }
    }

    /// Build the `generateContent` body.
    pub fn build_request_body(&self, request: &GenerateContentRequest) -> Value {
        let config = &request.config;
        let mut body = json!({ "contents": contents_to_gemini(&request.contents) });
        let mut obj = Map::new();
        if let Some(system) = config.system_instruction.as_deref().filter(|s| !s.is_empty()) {
            obj.insert(
                "systemInstruction".into(),
                json!({ "parts": [{ "text": system }] }),
            );
        }

        let mut gen_config = Map::new();
        if let Some(max) = config.max_output_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = config.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(mime) = &config.response_mime_type {
            gen_config.insert("responseMimeType".into(), mime.clone().into());
        }
        if let Some(schema) = &config.response_json_schema {
            gen_config.insert("responseJsonSchema".into(), schema.clone());
        }
        if !gen_config.is_empty() {
            obj.insert("generationConfig".into(), Value::Object(gen_config));
        }

        let declarations: Vec<Value> = flatten_declarations(&config.tools)
            .into_iter()
            .map(|d| {
                let mut decl = json!({ "name": d.name });
                if let Some(desc) = d.description {
                    decl["description"] = desc.into();
                }
                if let Some(schema) = d.parameters_json_schema {
                    decl["parametersJsonSchema"] = schema;
                } else if let Some(params) = d.parameters {
                    decl["parameters"] = params;
                }
                decl
            })
            .collect();
        if !declarations.is_empty() {
            obj.insert(
                "tools".into(),
                json!([{ "functionDeclarations": declarations }]),
            );
        }

        if let Value::Object(map) = &mut body {
            map.extend(obj);
        }
        body
    }

    async fn post(&self, url: String, body: &Value) -> Result<reqwest::Response, KestrelError> {
        let api_key = self.resolve_api_key()?;
        let send = async {
            let resp = self
                .client
                .post(url)
                .headers(google_headers(&api_key))
                .json(body)
                .send()
                .await?;
            Ok::<_, KestrelError>(resp)
        };
        let resp = with_timeout(self.timeout, send).await?;
        let status = resp.status().as_u16();
        if resp.status().is_success() {
            return Ok(resp);
        }
        let body_text = resp.text().await.unwrap_or_default();
        Err(google_error(status, &body_text))
    }
}

fn contents_to_gemini(turns: &[ChatTurn]) -> Vec<Value> {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::Model => "model",
                Role::User | Role::Tool => "user",
            };
            let parts: Vec<Value> = turn.parts.iter().filter_map(part_to_gemini).collect();
            json!({ "role": role, "parts": parts })
        })
        .collect()
}

fn part_to_gemini(part: &Part) -> Option<Value> {
    match part {
        Part::Text { text } => Some(json!({ "text": text })),
        Part::Thought { .. } => None,
        Part::FunctionCall(fc) => {
            let mut call = json!({ "name": fc.name, "args": fc.args });
            if let Some(id) = &fc.id {
                call["id"] = id.clone().into();
            }
            Some(json!({ "functionCall": call }))
        }
        Part::FunctionResponse(fr) => {
            let mut response = json!({ "name": fr.name, "response": fr.response });
            if let Some(id) = &fr.id {
                response["id"] = id.clone().into();
            }
            Some(json!({ "functionResponse": response }))
        }
    }
}

fn google_error(status: u16, body: &str) -> KestrelError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => KestrelError::Authentication(message),
        429 => KestrelError::RateLimited {
            message,
            retry_after_ms: None,
        },
        _ => match error.and_then(|e| e.get("status")).and_then(Value::as_str) {
            Some(provider_code) => KestrelError::api_with_details(
                status,
                message,
                ErrorDetails {
                    code: Some(ErrorCode::from_provider(provider_code)),
                    provider_code: Some(provider_code.to_string()),
                    request_id: None,
                },
            ),
            None => KestrelError::api(status, message),
        },
    }
}

impl GeminiResponse {
    fn into_response(self) -> GenerateContentResponse {
        let usage = self.usage_metadata.map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GenerateContentResponse {
                usage,
                ..Default::default()
            };
        };

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| {
                if let Some(fc) = part.function_call {
                    return Some(Part::FunctionCall(FunctionCall {
                        id: fc.id,
                        name: fc.name,
                        args: fc.args.unwrap_or_else(|| json!({})),
                    }));
                }
                let text = part.text?;
                Some(if part.thought {
                    Part::Thought { text }
                } else {
                    Part::Text { text }
                })
            })
            .collect();

        GenerateContentResponse {
            parts,
            finish_reason: candidate.finish_reason.as_deref().map(FinishReason::parse),
            usage,
        }
    }
}

#[async_trait]
impl ContentGenerator for GoogleGenerator {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<GenerateContentResponse, KestrelError> {
        let model = self.model_for(request);
        let body = self.build_request_body(request);
        debug!(model, "Google generate_content");

        let resp = self.post(self.url(model, "generateContent"), &body).await?;
        let data: GeminiResponse = resp.json().await?;
        Ok(data.into_response())
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError> {
        let model = self.model_for(request);
        let body = self.build_request_body(request);
        debug!(model, "Google generate_content_stream");

        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        let resp = self.post(url, &body).await?;
        let stream = sse_data_stream(resp).filter_map(|item| {
            futures::future::ready(match item {
                Ok(data) => match serde_json::from_str::<GeminiResponse>(&data) {
                    Ok(resp) => Some(Ok(resp.into_response())),
                    Err(e) => {
                        debug!(error = %e, "skipping unparseable Gemini chunk");
                        None
                    }
                },
                Err(e) => Some(Err(e)),
            })
        });
        Ok(Box::pin(stream))
    }

    async fn count_tokens(&self, contents: &[ChatTurn]) -> Result<u32, KestrelError> {
        let body = json!({ "contents": contents_to_gemini(contents) });
        let resp = self.post(self.url(&self.model, "countTokens"), &body).await?;
        let data: GeminiCountTokens = resp.json().await?;
        Ok(data.total_tokens)
    }

    async fn embed_content(
        &self,
        _request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, KestrelError> {
        Err(KestrelError::UnsupportedOperation(
            "embeddings are not supported by this client".to_string(),
        ))
    }
}

// Internal Gemini response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    id: Option<String>,
    name: String,
    args: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCountTokens {
    #[serde(default)]
    total_tokens: u32,
}
