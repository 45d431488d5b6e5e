//! Content generator capability and its implementations.

pub mod assembler;
pub mod factory;
pub mod http;
pub mod logging;
pub mod mapper;
pub mod wire;

#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "grok")]
pub mod grok;

pub use factory::{create_content_generator, AuthType, ContentGeneratorConfig, ProviderKind};
pub use logging::LoggingContentGenerator;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::KestrelError;
use crate::types::{ChatTurn, GenerateContentRequest, GenerateContentResponse};

/// A stream of canonical responses.
pub type ResponseStream = BoxStream<'static, Result<GenerateContentResponse, KestrelError>>;

/// Embedding request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedContentRequest {
    pub model: String,
    pub contents: Vec<String>,
}

/// Embedding response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EmbedContentResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// Core trait implemented by every model backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Provider name (e.g., "grok", "google").
    fn provider_name(&self) -> &str;

    /// The model this generator serves by default.
    fn model_id(&self) -> &str;

    /// Generate a complete response.
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
        prompt_id: &str,
    ) -> Result<GenerateContentResponse, KestrelError>;

    /// Generate a response as a stream of canonical chunks.
    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
        prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError>;

    /// Count (or estimate) the tokens of `contents`.
    async fn count_tokens(&self, contents: &[ChatTurn]) -> Result<u32, KestrelError>;

    /// Embed text. Backends without embeddings return
    /// [`KestrelError::UnsupportedOperation`].
    async fn embed_content(
        &self,
        request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, KestrelError>;
}
