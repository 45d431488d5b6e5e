//! Configuration system (layered: code > env > settings file).

pub mod settings;

pub use settings::{default_settings_path, Settings};

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::models::DEFAULT_PRIMARY_MODEL;
use crate::tools::ToolFilterConfig;

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<KestrelConfig> = OnceLock::new();

pub const DEFAULT_GROK_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 360_000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

pub const PROVIDER_GROK: &str = "grok";
pub const PROVIDER_GOOGLE: &str = "google";

/// Environment variables holding API keys. Later entries win, so
/// `GROK_API_KEY` takes precedence over `XAI_API_KEY`.
const KEY_ENV_MAPPINGS: [(&str, &str); 4] = [
    ("XAI_API_KEY", PROVIDER_GROK),
    ("GROK_API_KEY", PROVIDER_GROK),
    ("GEMINI_API_KEY", PROVIDER_GOOGLE),
    ("GOOGLE_API_KEY", PROVIDER_GOOGLE),
];

const URL_ENV_MAPPINGS: [(&str, &str); 2] = [
    ("GROK_BASE_URL", PROVIDER_GROK),
    ("GOOGLE_BASE_URL", PROVIDER_GOOGLE),
];

/// Layered configuration for Kestrel.
///
/// API keys and base URLs come from explicit setters or the environment;
/// generation defaults come from the settings file.
#[derive(Clone, Debug, Default)]
pub struct KestrelConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    settings: Settings,
    request_timeout_ms: Option<u64>,
}

impl KestrelConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the settings layer.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Load `.env`, environment variables and the default settings file.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let settings = Settings::load(&default_settings_path()).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable settings file");
            Settings::default()
        });
        Self::from_env_with_settings(settings)
    }

    /// Read environment variables on top of the given settings.
    pub fn from_env_with_settings(settings: Settings) -> Self {
        let mut config = Self::new().with_settings(settings);

        for (env_var, provider) in &KEY_ENV_MAPPINGS {
            if let Ok(key) = std::env::var(env_var) {
                if !key.is_empty() {
                    config.set_api_key(provider, key);
                }
            }
        }

        for (env_var, provider) in &URL_ENV_MAPPINGS {
            if let Ok(url) = std::env::var(env_var) {
                if !url.is_empty() {
                    config.set_base_url(provider, url);
                }
            }
        }

        match std::env::var("GROK_TIMEOUT_MS").map(|v| v.parse::<u64>()) {
            Ok(Ok(ms)) => config.request_timeout_ms = Some(ms),
            Ok(Err(e)) => warn!(error = %e, "ignoring invalid GROK_TIMEOUT_MS"),
            Err(_) => {}
        }

        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static KestrelConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        self.api_keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        self.base_urls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Model from the settings file, else the default primary model.
    pub fn model(&self) -> String {
        self.settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string())
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
    }

    /// Upstream request timeout: env, then settings file, then 6 minutes.
    pub fn request_timeout(&self) -> Duration {
        let ms = self
            .request_timeout_ms
            .or(self.settings.request_timeout_ms)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn temperature(&self) -> f64 {
        self.settings.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.settings
            .max_output_tokens
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }

    pub fn tool_filter(&self) -> ToolFilterConfig {
        let defaults = ToolFilterConfig::default();
        ToolFilterConfig {
            max_tools: self.settings.max_tools.unwrap_or(defaults.max_tools),
            optional_essentials_enabled: self
                .settings
                .optional_essentials_enabled
                .unwrap_or(defaults.optional_essentials_enabled),
        }
    }
}
