//! Model identifiers and context window sizes.

/// Model used for main conversations and tool-driven work.
pub const DEFAULT_PRIMARY_MODEL: &str = "x-ai/grok-code-fast-1";

/// Default model for the Google generation path.
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.5-pro";

/// Context window used when a model is not listed in [`token_limit`].
pub const DEFAULT_TOKEN_LIMIT: u32 = 1_048_576;

/// Context window size, in tokens, for a model id.
pub fn token_limit(model: &str) -> u32 {
    let id = model.rsplit('/').next().unwrap_or(model);
    match id {
        "grok-pro" | "gemini-1.5-pro" => 2_097_152,
        "grok-4" => 256_000,
        "grok-code-fast-1" => 256_000,
        "grok-2-1212-preview-image-generation" => 32_000,
        "grok-flash" | "grok-2-pro" | "grok-2-flash" | "grok-2-flash-lite" | "grok-2-1212"
        | "gemini-2.5-pro" | "gemini-2.5-flash" => 1_048_576,
        _ => DEFAULT_TOKEN_LIMIT,
    }
}
