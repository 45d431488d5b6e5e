//! Content generator decorator that traces every call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::KestrelError;
use crate::types::{ChatTurn, GenerateContentRequest, GenerateContentResponse};

use super::{ContentGenerator, EmbedContentRequest, EmbedContentResponse, ResponseStream};

/// Wraps a generator and logs requests, responses and failures.
pub struct LoggingContentGenerator {
    inner: Arc<dyn ContentGenerator>,
}

impl LoggingContentGenerator {
    pub fn new(inner: Arc<dyn ContentGenerator>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn ContentGenerator> {
        &self.inner
    }

    fn log_request(&self, request: &GenerateContentRequest, prompt_id: &str, stream: bool) {
        debug!(
            provider = self.inner.provider_name(),
            model = %request.model,
            prompt_id,
            stream,
            turns = request.contents.len(),
            tools = request.config.tools.len(),
            "api request"
        );
    }

    fn log_error(&self, prompt_id: &str, started: Instant, err: &KestrelError) {
        warn!(
            provider = self.inner.provider_name(),
            prompt_id,
            duration_ms = started.elapsed().as_millis() as u64,
            category = ?err.category(),
            error = %err,
            "api error"
        );
    }
}

#[async_trait]
impl ContentGenerator for LoggingContentGenerator {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        prompt_id: &str,
    ) -> Result<GenerateContentResponse, KestrelError> {
        self.log_request(request, prompt_id, false);
        let started = Instant::now();
        match self.inner.generate_content(request, prompt_id).await {
            Ok(response) => {
                debug!(
                    provider = self.inner.provider_name(),
                    prompt_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    parts = response.parts.len(),
                    finish_reason = ?response.finish_reason,
                    usage = ?response.usage,
                    "api response"
                );
                Ok(response)
            }
            Err(err) => {
                self.log_error(prompt_id, started, &err);
                Err(err)
            }
        }
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError> {
        self.log_request(request, prompt_id, true);
        let started = Instant::now();
        match self.inner.generate_content_stream(request, prompt_id).await {
            Ok(stream) => {
                debug!(
                    provider = self.inner.provider_name(),
                    prompt_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "api stream opened"
                );
                Ok(stream)
            }
            Err(err) => {
                self.log_error(prompt_id, started, &err);
                Err(err)
            }
        }
    }

    async fn count_tokens(&self, contents: &[ChatTurn]) -> Result<u32, KestrelError> {
        self.inner.count_tokens(contents).await
    }

    async fn embed_content(
        &self,
        request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, KestrelError> {
        self.inner.embed_content(request).await
    }
}
