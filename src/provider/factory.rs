//! Provider selection and generator construction.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::config::{KestrelConfig, PROVIDER_GOOGLE, PROVIDER_GROK};
use crate::error::KestrelError;
use crate::models::DEFAULT_GOOGLE_MODEL;
use crate::tools::ToolFilterConfig;

use super::{ContentGenerator, LoggingContentGenerator};

/// Backend a generator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Grok,
    Google,
}

/// How the caller authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AuthType {
    GrokApiKey,
    GeminiApiKey,
}

/// Everything needed to build a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentGeneratorConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub provider: ProviderKind,
    pub auth_type: Option<AuthType>,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub tool_filter: ToolFilterConfig,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl ContentGeneratorConfig {
    /// Pick a provider from the configured credentials.
    ///
    /// Without an explicit auth type a Grok key selects Grok, then a Google
    /// key selects Google. With nothing configured Grok is chosen and the
    /// missing key surfaces on the first request.
    pub fn resolve(config: &KestrelConfig, auth_type: Option<AuthType>) -> Self {
        let grok_key = config.get_api_key(PROVIDER_GROK);
        let google_key = config.get_api_key(PROVIDER_GOOGLE);

        let provider = match auth_type {
            Some(AuthType::GrokApiKey) => ProviderKind::Grok,
            Some(AuthType::GeminiApiKey) => ProviderKind::Google,
            None if grok_key.is_some() => ProviderKind::Grok,
            None if google_key.is_some() => ProviderKind::Google,
            None => ProviderKind::Grok,
        };
        let (api_key, base_url) = match provider {
            ProviderKind::Grok => (grok_key, config.get_base_url(PROVIDER_GROK)),
            ProviderKind::Google => (google_key, config.get_base_url(PROVIDER_GOOGLE)),
        };

        let model = match (provider, config.settings().model.clone()) {
            (_, Some(model)) => model,
            (ProviderKind::Google, None) => DEFAULT_GOOGLE_MODEL.to_string(),
            (ProviderKind::Grok, None) => config.model(),
        };

        Self {
            model,
            api_key,
            provider,
            auth_type,
            base_url,
            timeout: config.request_timeout(),
            tool_filter: config.tool_filter(),
            temperature: config.temperature(),
            max_output_tokens: config.max_output_tokens(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Build the generator for `config`, wrapped in request logging.
pub fn create_content_generator(
    config: &ContentGeneratorConfig,
) -> Result<Arc<dyn ContentGenerator>, KestrelError> {
    debug!(provider = %config.provider, model = %config.model, "creating content generator");
    let inner: Arc<dyn ContentGenerator> = match config.provider {
        #[cfg(feature = "grok")]
        ProviderKind::Grok => {
            let options = super::grok::GrokOptions::builder()
                .model(config.model.clone())
                .maybe_api_key(config.api_key.clone())
                .maybe_base_url(config.base_url.clone())
                .timeout(config.timeout)
                .tool_filter(config.tool_filter)
                .temperature(config.temperature)
                .max_output_tokens(config.max_output_tokens)
                .build();
            Arc::new(super::grok::GrokGenerator::new(options)?)
        }
        #[cfg(feature = "google")]
        ProviderKind::Google => Arc::new(super::google::GoogleGenerator::new(
            config.model.clone(),
            config.api_key.clone(),
            config.base_url.clone(),
            Some(config.timeout),
        )?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(KestrelError::Configuration(format!(
                "provider '{other}' is not enabled in this build"
            )))
        }
    };
    Ok(Arc::new(LoggingContentGenerator::new(inner)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grok_key_auto_selects_grok() {
        let config = KestrelConfig::new();
        config.set_api_key(PROVIDER_GROK, "xai-1".into());
        config.set_api_key(PROVIDER_GOOGLE, "g-1".into());
        let resolved = ContentGeneratorConfig::resolve(&config, None);
        assert_eq!(resolved.provider, ProviderKind::Grok);
        assert_eq!(resolved.api_key.as_deref(), Some("xai-1"));
    }

    #[test]
    fn gemini_auth_type_selects_google() {
        let config = KestrelConfig::new();
        config.set_api_key(PROVIDER_GROK, "xai-1".into());
        config.set_api_key(PROVIDER_GOOGLE, "g-1".into());
        let resolved = ContentGeneratorConfig::resolve(&config, Some(AuthType::GeminiApiKey));
        assert_eq!(resolved.provider, ProviderKind::Google);
        assert_eq!(resolved.api_key.as_deref(), Some("g-1"));
        assert_eq!(resolved.model, DEFAULT_GOOGLE_MODEL);
    }

    #[test]
    fn no_credentials_defers_failure_to_request_time() {
        let resolved = ContentGeneratorConfig::resolve(&KestrelConfig::new(), None);
        assert_eq!(resolved.provider, ProviderKind::Grok);
        assert!(resolved.api_key.is_none());
        assert!(create_content_generator(&resolved).is_ok());
    }

    #[test]
    fn auth_type_round_trips_through_strings() {
        assert_eq!(AuthType::GrokApiKey.to_string(), "grok-api-key");
        assert_eq!("gemini-api-key".parse::<AuthType>().unwrap(), AuthType::GeminiApiKey);
    }

    #[test]
    fn created_generator_reports_provider() {
        let resolved = ContentGeneratorConfig::resolve(&KestrelConfig::new(), None)
            .with_model("x-ai/grok-4");
        let generator = create_content_generator(&resolved).unwrap();
        assert_eq!(generator.provider_name(), "grok");
        assert_eq!(generator.model_id(), "x-ai/grok-4");
    }
}
