use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::errors::AgentError;
use crate::integration::composio::{ApiVersion, ComposioConfig, COMPOSIO_HOST};
use crate::providers::configs::{AnthropicProviderConfig, ANTHROPIC_HOST, DEFAULT_MODEL};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}. Set them in your environment or a .env file.", .0.join(", "))]
    MissingEnvVars(Vec<String>),
    #[error("Invalid value for {env_var}: {message}")]
    Invalid { env_var: String, message: String },
    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        AgentError::Configuration(err.to_string())
    }
}

/// Environment as loaded, before required values are checked
#[derive(Debug, Deserialize)]
struct RawSettings {
    composio_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    model_name: String,
    google_meet_user_id: String,
    agent_max_turns: u32,
    oauth_timeout: u64,
    max_retries: u32,
    retry_base_delay: f64,
    retry_max_delay: f64,
    composio_host: String,
    anthropic_host: String,
    composio_api_version: Option<String>,
    include_drive: bool,
}

/// Validated settings. Field names match the environment variables they come from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub composio_api_key: String,
    pub anthropic_api_key: String,
    pub model_name: String,
    pub google_meet_user_id: String,
    pub agent_max_turns: u32,
    /// Seconds to wait for the user to finish OAuth
    pub oauth_timeout: u64,
    pub max_retries: u32,
    pub retry_base_delay: f64,
    pub retry_max_delay: f64,
    pub composio_host: String,
    pub anthropic_host: String,
    /// `None` probes the platform at startup
    pub composio_api_version: Option<ApiVersion>,
    pub include_drive: bool,
}

impl Settings {
    /// Load from the process environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("model_name", DEFAULT_MODEL)?
            .set_default("google_meet_user_id", "default")?
            .set_default("agent_max_turns", 10)?
            .set_default("oauth_timeout", 300)?
            .set_default("max_retries", 3)?
            .set_default("retry_base_delay", 1.0)?
            .set_default("retry_max_delay", 10.0)?
            .set_default("composio_host", COMPOSIO_HOST)?
            .set_default("anthropic_host", ANTHROPIC_HOST)?
            .set_default("include_drive", true)?
            .add_source(environment)
            .build()?;

        let raw: RawSettings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            if let config::ConfigError::Type { key: Some(key), .. } = &err {
                return ConfigError::Invalid {
                    env_var: key.to_uppercase(),
                    message: err.to_string(),
                };
            }
            ConfigError::Other(err)
        })?;

        Self::validate(raw)
    }

    /// Fail fast, listing every missing required variable at once
    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let required = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let composio_api_key = required(raw.composio_api_key);
        let anthropic_api_key = required(raw.anthropic_api_key);

        let mut missing = Vec::new();
        if composio_api_key.is_none() {
            missing.push("COMPOSIO_API_KEY".to_string());
        }
        if anthropic_api_key.is_none() {
            missing.push("ANTHROPIC_API_KEY".to_string());
        }
        let (Some(composio_api_key), Some(anthropic_api_key)) =
            (composio_api_key, anthropic_api_key)
        else {
            return Err(ConfigError::MissingEnvVars(missing));
        };

        if raw.agent_max_turns == 0 {
            return Err(invalid("AGENT_MAX_TURNS", "must be at least 1"));
        }
        if raw.oauth_timeout == 0 {
            return Err(invalid("OAUTH_TIMEOUT", "must be at least 1 second"));
        }
        if !(raw.retry_base_delay.is_finite() && raw.retry_base_delay >= 0.0) {
            return Err(invalid("RETRY_BASE_DELAY", "must be a non-negative number"));
        }
        if !(raw.retry_max_delay.is_finite() && raw.retry_max_delay >= raw.retry_base_delay) {
            return Err(invalid("RETRY_MAX_DELAY", "must not be less than RETRY_BASE_DELAY"));
        }

        let composio_api_version = raw
            .composio_api_version
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<ApiVersion>()
                    .map_err(|_| invalid("COMPOSIO_API_VERSION", "expected one of: v3, legacy"))
            })
            .transpose()?;

        Ok(Self {
            composio_api_key,
            anthropic_api_key,
            model_name: raw.model_name,
            google_meet_user_id: raw.google_meet_user_id,
            agent_max_turns: raw.agent_max_turns,
            oauth_timeout: raw.oauth_timeout,
            max_retries: raw.max_retries,
            retry_base_delay: raw.retry_base_delay,
            retry_max_delay: raw.retry_max_delay,
            composio_host: raw.composio_host,
            anthropic_host: raw.anthropic_host,
            composio_api_version,
            include_drive: raw.include_drive,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs_f64(self.retry_base_delay),
            Duration::from_secs_f64(self.retry_max_delay),
        )
    }

    pub fn oauth_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_timeout)
    }

    pub fn composio_config(&self) -> ComposioConfig {
        ComposioConfig {
            host: self.composio_host.clone(),
            api_key: self.composio_api_key.clone(),
            api_version: self.composio_api_version,
        }
    }

    pub fn provider_config(&self) -> AnthropicProviderConfig {
        AnthropicProviderConfig {
            host: self.anthropic_host.clone(),
            api_key: self.anthropic_api_key.clone(),
            model: self.model_name.clone(),
            max_tokens: None,
        }
    }
}

fn invalid(env_var: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        env_var: env_var.to_string(),
        message: message.to_string(),
    }
}
