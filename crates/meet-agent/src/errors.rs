use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    AuthConfigNotFound(String),

    #[error("OAuth flow timed out after {timeout} seconds. Please try again.")]
    OAuthTimeout { timeout: u64 },

    #[error("{0}")]
    ConnectionExpired(String),

    #[error("{0}")]
    Connection(String),

    #[error("{message}")]
    Api { message: String, status: Option<u16> },

    #[error("Google Meet API rate limit exceeded.{}", retry_after.map(|s| format!(" Retry after {} seconds.", s)).unwrap_or_default())]
    RateLimit { retry_after: Option<u64> },

    #[error("Claude API error: {message}")]
    Provider { message: String, status: Option<u16> },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn api<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        AgentError::Api {
            message: message.into(),
            status,
        }
    }

    pub fn auth_config_not_found() -> Self {
        AgentError::AuthConfigNotFound(
            "No Google Meet auth config found. Please create one at \
             https://app.composio.dev (Auth Configs > Create > Google Meet)"
                .to_string(),
        )
    }

    pub fn connection_expired() -> Self {
        AgentError::ConnectionExpired(
            "Google Meet connection has expired. Please reconnect your account.".to_string(),
        )
    }

    /// Stable name of the error kind, used in the JSON envelope fed back to the model
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Configuration(_) => "ConfigurationError",
            AgentError::AuthConfigNotFound(_) => "AuthConfigNotFoundError",
            AgentError::OAuthTimeout { .. } => "OAuthTimeoutError",
            AgentError::ConnectionExpired(_) => "ConnectionExpiredError",
            AgentError::Connection(_) => "ComposioConnectionError",
            AgentError::Api { .. } => "GoogleMeetAPIError",
            AgentError::RateLimit { .. } => "RateLimitError",
            AgentError::Provider { .. } => "ProviderError",
            AgentError::InvalidParameters(_) => "InvalidParameters",
            AgentError::Internal(_) => "InternalError",
        }
    }

    /// HTTP-like status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Api { status, .. } | AgentError::Provider { status, .. } => *status,
            AgentError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Connection(_) | AgentError::RateLimit { .. }
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
