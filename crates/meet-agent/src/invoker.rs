use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::is_allowed_tool;
use crate::errors::{AgentError, AgentResult};
use crate::integration::{
    ConnectedAccount, IntegrationClient, IntegrationError, IntegrationErrorKind, GOOGLEDRIVE,
    GOOGLEMEET,
};
use crate::models::tool::ToolCall;
use crate::retry::RetryPolicy;

pub const DOWNLOAD_TOOL: &str = "GOOGLEDRIVE_DOWNLOAD_FILE";
const DOWNLOAD_USER_AGENT: &str = "GoogleMeetAgent/1.0";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes tool calls requested by the model
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one tool call, returning `{"success": true, "data": ..}` on success
    async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value>;
}

/// Executes tools on the integration platform with the user's connected accounts
pub struct ToolInvoker {
    client: Arc<dyn IntegrationClient>,
    user_id: String,
    retry: RetryPolicy,
    http: Client,
}

impl ToolInvoker {
    pub fn new<S: Into<String>>(
        client: Arc<dyn IntegrationClient>,
        user_id: S,
        retry: RetryPolicy,
    ) -> AgentResult<Self> {
        let http = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| AgentError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_id: user_id.into(),
            retry,
            http,
        })
    }

    async fn call_once(&self, tool_call: &ToolCall) -> AgentResult<Value> {
        let name = tool_call.name.as_str();

        let accounts = self
            .client
            .list_connected_accounts(&self.user_id, None)
            .await
            .map_err(|e| map_integration_error(name, e))?;
        let account = select_account(name, &accounts).ok_or_else(|| missing_account(name))?;
        tracing::debug!("Executing {} with connected account {}", name, account.id);

        let result = self
            .client
            .execute(name, &self.user_id, &account.id, &tool_call.arguments)
            .await
            .map_err(|e| map_integration_error(name, e))?;

        if let Some(error) = reported_error(&result) {
            return Err(AgentError::api(format!("API Error: {}", error), None));
        }

        let mut data = match result {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Object(map)),
            other => other,
        };

        if name == DOWNLOAD_TOOL {
            self.resolve_download(&mut data).await;
        }

        Ok(json!({"success": true, "data": data}))
    }

    /// Replace a temporary download location with the content behind it
    async fn resolve_download(&self, data: &mut Value) {
        let url = match data
            .pointer("/downloaded_file_content/s3url")
            .and_then(Value::as_str)
        {
            Some(url) => url.to_string(),
            None => return,
        };

        let (content, fetched) = match fetch_text(&self.http, &url).await {
            Ok(text) => (text, true),
            Err(e) => {
                // the error text must not leak the temporary location
                let e = e.without_url();
                tracing::warn!("Failed to fetch downloaded file content: {}", e);
                (format!("Error fetching content: {}", e), false)
            }
        };

        if let Some(downloaded) = data
            .get_mut("downloaded_file_content")
            .and_then(Value::as_object_mut)
        {
            downloaded.remove("s3url");
        }
        if let Some(object) = data.as_object_mut() {
            object.insert("file_content".to_string(), Value::String(content));
            object.insert("content_fetched".to_string(), Value::Bool(fetched));
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolInvoker {
    async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value> {
        if !is_allowed_tool(&tool_call.name) {
            return Err(AgentError::InvalidParameters(format!(
                "Tool {} is not available to this agent",
                tool_call.name
            )));
        }

        self.retry
            .run(
                &format!("Tool {}", tool_call.name),
                move || self.call_once(tool_call),
                AgentError::is_retryable,
            )
            .await
    }
}

/// Pick the connected account for the integration that owns the tool
fn select_account<'a>(
    tool: &str,
    accounts: &'a [ConnectedAccount],
) -> Option<&'a ConnectedAccount> {
    if tool.starts_with("GOOGLEDRIVE_") {
        accounts.iter().find(|a| a.belongs_to(GOOGLEDRIVE))
    } else if tool.starts_with("GOOGLEMEET_") {
        accounts.iter().find(|a| a.belongs_to(GOOGLEMEET))
    } else {
        accounts
            .iter()
            .find(|a| a.belongs_to(GOOGLEMEET))
            .or_else(|| accounts.first())
    }
}

fn missing_account(tool: &str) -> AgentError {
    let message = if tool.starts_with("GOOGLEDRIVE_") {
        "No active Google Drive connection found. Please set up Google Drive integration."
    } else {
        "No active Google Meet connection found. Please run setup first."
    };
    AgentError::api(message, Some(401))
}

fn map_integration_error(tool: &str, err: IntegrationError) -> AgentError {
    match err.kind {
        IntegrationErrorKind::RateLimited { retry_after } => AgentError::RateLimit { retry_after },
        IntegrationErrorKind::Forbidden => AgentError::api(
            "Permission denied. Ensure you have a Google Workspace account with Meet API access.",
            Some(403),
        ),
        IntegrationErrorKind::NotFound => {
            AgentError::api(format!("Resource not found: {}", tool), Some(404))
        }
        IntegrationErrorKind::Connection => {
            AgentError::Connection(format!("Failed to execute {}: {}", tool, err.message))
        }
        IntegrationErrorKind::Api => {
            AgentError::api(format!("Failed to execute {}: {}", tool, err.message), err.status)
        }
    }
}

/// The error a result body reports, if the call did not succeed
fn reported_error(result: &Value) -> Option<String> {
    let error = result.get("error").filter(|e| !is_empty_error(e))?;
    if result.get("successful").and_then(Value::as_bool) == Some(true) {
        return None;
    }
    Some(match error {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    })
}

fn is_empty_error(error: &Value) -> bool {
    match error {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

async fn fetch_text(http: &Client, url: &str) -> reqwest::Result<String> {
    let bytes = http
        .get(url)
        .header(USER_AGENT, DOWNLOAD_USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(decode_text(&bytes))
}

/// UTF-8, falling back to Latin-1 which maps every byte to a char
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
