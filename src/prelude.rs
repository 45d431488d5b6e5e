//! Convenience re-exports for common use.

pub use crate::agent::{ChatSession, StreamEvent, Turn};
pub use crate::config::KestrelConfig;
pub use crate::error::{KestrelError, Result};
pub use crate::provider::{create_content_generator, ContentGenerator, ContentGeneratorConfig};
pub use crate::types::{
    ChatTurn, FinishReason, FunctionDeclaration, GenerateContentConfig, Part, Role,
    ToolCallRequest, ToolCallResponse, ToolSpec,
};
