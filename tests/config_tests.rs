//! Tests for configuration system.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use kestrel::config::{
    KestrelConfig, Settings, DEFAULT_REQUEST_TIMEOUT_MS, PROVIDER_GOOGLE, PROVIDER_GROK,
};
use kestrel::provider::{AuthType, ContentGeneratorConfig, ProviderKind};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 7] = [
    "XAI_API_KEY",
    "GROK_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "GROK_BASE_URL",
    "GOOGLE_BASE_URL",
    "GROK_TIMEOUT_MS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_env() -> EnvGuard {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    guard
}

#[test]
fn config_set_get_api_key() {
    let config = KestrelConfig::new();
    config.set_api_key(PROVIDER_GROK, "xai-test-123".to_string());
    assert_eq!(
        config.get_api_key(PROVIDER_GROK),
        Some("xai-test-123".to_string())
    );
    assert_eq!(config.get_api_key(PROVIDER_GOOGLE), None);
}

#[test]
fn config_set_get_base_url() {
    let config = KestrelConfig::new();
    config.set_base_url(PROVIDER_GROK, "http://localhost:8080/v1".to_string());
    assert_eq!(
        config.get_base_url(PROVIDER_GROK),
        Some("http://localhost:8080/v1".to_string())
    );
}

#[test]
fn config_from_env_prefers_grok_key_over_xai_key() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("XAI_API_KEY", "xai-key");
    std::env::set_var("GROK_API_KEY", "grok-key");
    std::env::set_var("GEMINI_API_KEY", "gemini-key");

    let config = KestrelConfig::from_env_with_settings(Settings::default());

    assert_eq!(config.get_api_key(PROVIDER_GROK), Some("grok-key".to_string()));
    assert_eq!(
        config.get_api_key(PROVIDER_GOOGLE),
        Some("gemini-key".to_string())
    );
}

#[test]
fn config_from_env_falls_back_to_xai_key() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("XAI_API_KEY", "xai-key");

    let config = KestrelConfig::from_env_with_settings(Settings::default());
    assert_eq!(config.get_api_key(PROVIDER_GROK), Some("xai-key".to_string()));
}

#[test]
fn config_from_env_reads_base_url_and_timeout() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("GROK_BASE_URL", "http://grok.local/v1");
    std::env::set_var("GROK_TIMEOUT_MS", "1500");

    let config = KestrelConfig::from_env_with_settings(Settings::default());
    assert_eq!(
        config.get_base_url(PROVIDER_GROK),
        Some("http://grok.local/v1".to_string())
    );
    assert_eq!(config.request_timeout(), Duration::from_millis(1500));
}

#[test]
fn invalid_timeout_is_ignored() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("GROK_TIMEOUT_MS", "soon");

    let config = KestrelConfig::from_env_with_settings(Settings::default());
    assert_eq!(
        config.request_timeout(),
        Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
    );
}

#[test]
fn empty_env_values_are_not_keys() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("GROK_API_KEY", "");

    let config = KestrelConfig::from_env_with_settings(Settings::default());
    assert!(!config.has_credentials(PROVIDER_GROK));
}

#[test]
fn generator_config_uses_settings_and_env() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("GROK_API_KEY", "grok-key");
    let settings = Settings {
        model: Some("x-ai/grok-4".into()),
        max_tools: Some(20),
        temperature: Some(0.1),
        ..Default::default()
    };

    let config = KestrelConfig::from_env_with_settings(settings);
    let resolved = ContentGeneratorConfig::resolve(&config, None);

    assert_eq!(resolved.provider, ProviderKind::Grok);
    assert_eq!(resolved.model, "x-ai/grok-4");
    assert_eq!(resolved.api_key.as_deref(), Some("grok-key"));
    assert_eq!(resolved.tool_filter.max_tools, 20);
    assert!((resolved.temperature - 0.1).abs() < f64::EPSILON);

    let google = ContentGeneratorConfig::resolve(&config, Some(AuthType::GeminiApiKey));
    assert_eq!(google.provider, ProviderKind::Google);
    assert!(google.api_key.is_none());
}
