use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, ProviderResponse};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_message, get_stop_reason, get_usage, messages_to_anthropic_spec,
    tools_to_anthropic_spec,
};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::retry::RetryPolicy;

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
    retry: RetryPolicy,
}

/// Overload, rate limits, server errors and dropped connections are worth another attempt
fn is_transient(err: &AgentError) -> bool {
    match err {
        AgentError::Provider { status: None, .. } => true,
        AgentError::Provider {
            status: Some(status),
            ..
        } => matches!(status, 408 | 409 | 429 | 500..=599),
        _ => false,
    }
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| AgentError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(&self, payload: &Value) -> AgentResult<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| AgentError::Provider {
                message: e.to_string(),
                status: None,
            })?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| AgentError::Provider {
                message: format!("Invalid response body: {}", e),
                status: Some(200),
            }),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AgentError::Provider {
                    message: format!("Request failed: {} - {}", status, error_text),
                    status: Some(status.as_u16()),
                })
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> AgentResult<ProviderResponse> {
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens(),
            "messages": messages_to_anthropic_spec(messages),
        });

        if let Some(object) = payload.as_object_mut() {
            if !system.is_empty() {
                object.insert("system".to_string(), json!(system));
            }
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(tools_to_anthropic_spec(tools)));
            }
        }

        let payload = &payload;
        let response = self
            .retry
            .run("Anthropic request", move || self.post(payload), is_transient)
            .await?;

        let message = anthropic_response_to_message(&response)?;
        let stop_reason = get_stop_reason(&response);
        let usage = get_usage(&response);
        tracing::debug!(
            "Model returned stop reason {:?} ({:?} input / {:?} output tokens)",
            stop_reason,
            usage.input_tokens,
            usage.output_tokens
        );

        Ok(ProviderResponse::new(message, stop_reason, usage))
    }
}
