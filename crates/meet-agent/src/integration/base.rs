use async_trait::async_trait;
use serde_json::Value;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::models::tool::Tool;

/// Toolkit slug for meeting records, participants and transcripts
pub const GOOGLEMEET: &str = "googlemeet";
/// Toolkit slug for file search and download
pub const GOOGLEDRIVE: &str = "googledrive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationErrorKind {
    /// Transport-level failure or an unavailable upstream
    Connection,
    RateLimited { retry_after: Option<u64> },
    Forbidden,
    NotFound,
    /// Any other failure reported by the platform
    Api,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct IntegrationError {
    pub kind: IntegrationErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

impl IntegrationError {
    pub fn new<S: Into<String>>(kind: IntegrationErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Classify from an HTTP status code
    pub fn from_status<S: Into<String>>(status: u16, message: S, retry_after: Option<u64>) -> Self {
        let kind = match status {
            429 => IntegrationErrorKind::RateLimited { retry_after },
            401 | 403 => IntegrationErrorKind::Forbidden,
            404 => IntegrationErrorKind::NotFound,
            408 | 500..=599 => IntegrationErrorKind::Connection,
            _ => IntegrationErrorKind::Api,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Classify a failure that carries no status code, from its text alone
    pub fn from_message<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        Self::new(classify_message(&message), message)
    }
}

/// Fallback classification by substring matching on error text.
///
/// Only used for failures without a status code. Matching on text such as "429" or
/// "permission" can misclassify unrelated errors that happen to contain those words.
pub fn classify_message(message: &str) -> IntegrationErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") {
        IntegrationErrorKind::RateLimited { retry_after: None }
    } else if lower.contains("403") || lower.contains("permission") {
        IntegrationErrorKind::Forbidden
    } else if lower.contains("404") || lower.contains("not found") {
        IntegrationErrorKind::NotFound
    } else if lower.contains("connection")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("dns")
    {
        IntegrationErrorKind::Connection
    } else {
        IntegrationErrorKind::Api
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            IntegrationError::new(IntegrationErrorKind::Connection, err.to_string())
        } else if let Some(status) = err.status() {
            IntegrationError::from_status(status.as_u16(), err.to_string(), None)
        } else if err.is_decode() {
            IntegrationError::new(
                IntegrationErrorKind::Api,
                format!("Unexpected response from integration platform: {}", err),
            )
        } else {
            IntegrationError::from_message(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ConnectionStatus {
    Initializing,
    Initiated,
    Active,
    Inactive,
    Failed,
    Expired,
}

/// A user's OAuth grant to one toolkit
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub toolkit: String,
    /// `None` when the platform did not report a status we recognise
    pub status: Option<ConnectionStatus>,
}

impl ConnectedAccount {
    pub fn new<I: Into<String>, T: Into<String>>(
        id: I,
        toolkit: T,
        status: Option<ConnectionStatus>,
    ) -> Self {
        Self {
            id: id.into(),
            toolkit: toolkit.into(),
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == Some(ConnectionStatus::Active)
    }

    pub fn belongs_to(&self, toolkit: &str) -> bool {
        self.toolkit.eq_ignore_ascii_case(toolkit)
    }
}

/// A pending OAuth connection the user still has to approve in the browser
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRequest {
    pub id: String,
    pub redirect_url: String,
}

/// Normalized contract of the integration platform
#[async_trait]
pub trait IntegrationClient: Send + Sync {
    /// Operations offered by one toolkit, in catalog order
    async fn list_tools(&self, toolkit: &str, user_id: &str) -> IntegrationResult<Vec<Tool>>;

    /// Execute one operation on behalf of a connected account, returning the raw result body
    async fn execute(
        &self,
        tool: &str,
        user_id: &str,
        connected_account_id: &str,
        arguments: &Value,
    ) -> IntegrationResult<Value>;

    /// Active connected accounts of a user, optionally limited to one toolkit
    async fn list_connected_accounts(
        &self,
        user_id: &str,
        toolkit: Option<&str>,
    ) -> IntegrationResult<Vec<ConnectedAccount>>;

    /// The platform-side OAuth app registered for a toolkit, if any
    async fn find_auth_config(&self, toolkit: &str) -> IntegrationResult<Option<String>>;

    async fn initiate_connection(
        &self,
        user_id: &str,
        toolkit: &str,
        auth_config_id: &str,
    ) -> IntegrationResult<ConnectionRequest>;

    async fn get_connected_account(&self, id: &str) -> IntegrationResult<ConnectedAccount>;
}
