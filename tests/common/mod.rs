//! Shared test helpers and mock generator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use kestrel::error::KestrelError;
use kestrel::provider::{ContentGenerator, EmbedContentRequest, EmbedContentResponse, ResponseStream};
use kestrel::types::*;

/// One scripted reply.
pub enum Script {
    /// Stream these items, then end.
    Stream(Vec<Result<GenerateContentResponse, KestrelError>>),
    /// Stream the first item, wait for the gate, then stream the rest.
    Gated(
        Vec<Result<GenerateContentResponse, KestrelError>>,
        Arc<Notify>,
    ),
    /// Fail before any stream is opened.
    Fail(KestrelError),
    /// Wait before opening the stream, like a request awaiting headers.
    Delayed(Duration, Vec<Result<GenerateContentResponse, KestrelError>>),
}

/// A generator that replays queued scripts and records requests.
pub struct MockGenerator {
    model_id: String,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl MockGenerator {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, script: Script) -> &Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Queue a stream of text chunks followed by a stop.
    pub fn queue_text(&self, chunks: &[&str]) -> &Self {
        let mut items: Vec<_> = chunks
            .iter()
            .map(|c| Ok(GenerateContentResponse::from_text(*c)))
            .collect();
        items.push(Ok(GenerateContentResponse::finished(
            FinishReason::Stop,
            Some(Usage {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
            }),
        )));
        self.queue(Script::Stream(items))
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<GenerateContentResponse, KestrelError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(GenerateContentResponse::from_text("Mock response"))
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        _prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Script::Stream(vec![Ok(GenerateContentResponse::from_text(
                    "Mock streamed response",
                ))])
            });

        match script {
            Script::Fail(err) => Err(err),
            Script::Delayed(delay, items) => {
                tokio::time::sleep(delay).await;
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Script::Stream(items) => Ok(Box::pin(futures::stream::iter(items))),
            Script::Gated(items, gate) => {
                let stream = async_stream::stream! {
                    let mut items = items.into_iter();
                    if let Some(first) = items.next() {
                        yield first;
                    }
                    gate.notified().await;
                    for item in items {
                        yield item;
                    }
                };
                Ok(Box::pin(stream))
            }
        }
    }

    async fn count_tokens(&self, contents: &[ChatTurn]) -> Result<u32, KestrelError> {
        Ok(contents.len() as u32)
    }

    async fn embed_content(
        &self,
        _request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, KestrelError> {
        Err(KestrelError::UnsupportedOperation("mock".into()))
    }
}

pub fn function_call(id: Option<&str>, name: &str, args: serde_json::Value) -> GenerateContentResponse {
    GenerateContentResponse::from_function_call(FunctionCall {
        id: id.map(str::to_string),
        name: name.to_string(),
        args,
    })
}

pub fn declaration(name: &str) -> FunctionDeclaration {
    FunctionDeclaration::new(
        name,
        format!("{name} tool"),
        serde_json::json!({ "type": "object", "properties": {} }),
    )
}
