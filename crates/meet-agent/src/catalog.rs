//! Loads the operations the model may call.
//!
//! Meeting operations are required. File operations are an optional enhancement: if
//! they cannot be fetched the agent still works with meeting data alone.

use serde::Serialize;

use crate::errors::{AgentError, AgentResult};
use crate::integration::{IntegrationClient, GOOGLEDRIVE, GOOGLEMEET};
use crate::models::tool::Tool;
use crate::retry::RetryPolicy;

pub const MEET_TOOLS: &[&str] = &[
    "GOOGLEMEET_LIST_CONFERENCE_RECORDS",
    "GOOGLEMEET_GET_CONFERENCE_RECORD",
    "GOOGLEMEET_LIST_PARTICIPANT_SESSIONS",
    "GOOGLEMEET_GET_PARTICIPANT_SESSION",
    "GOOGLEMEET_GET_TRANSCRIPTS_BY_CONFERENCE_RECORD_ID",
];

pub const DRIVE_TOOLS: &[&str] = &[
    "GOOGLEDRIVE_LIST_FILES",
    "GOOGLEDRIVE_DOWNLOAD_FILE",
    "GOOGLEDRIVE_GET_FILE_METADATA",
];

const SUMMARY_DESCRIPTION_LIMIT: usize = 100;

/// Whether the tool is one of the read-only operations the agent may run
pub fn is_allowed_tool(name: &str) -> bool {
    MEET_TOOLS.contains(&name) || DRIVE_TOOLS.contains(&name)
}

fn allowed(tools: Vec<Tool>, allow_list: &[&str]) -> Vec<Tool> {
    tools
        .into_iter()
        .filter(|tool| allow_list.contains(&tool.name.as_str()))
        .collect()
}

async fn fetch_toolkit(
    client: &dyn IntegrationClient,
    toolkit: &str,
    user_id: &str,
    retry: &RetryPolicy,
) -> AgentResult<Vec<Tool>> {
    retry
        .run(
            &format!("Fetching {} tools", toolkit),
            move || async move {
                client.list_tools(toolkit, user_id).await.map_err(|e| {
                    AgentError::Connection(format!("Failed to fetch {} tools: {}", toolkit, e))
                })
            },
            AgentError::is_retryable,
        )
        .await
}

/// Fetch the allow-listed meeting operations, plus file operations when `include_drive` is set.
///
/// Fails only when the meeting catalog cannot be fetched.
pub async fn load_tools(
    client: &dyn IntegrationClient,
    user_id: &str,
    include_drive: bool,
    retry: &RetryPolicy,
) -> AgentResult<Vec<Tool>> {
    let mut tools = allowed(
        fetch_toolkit(client, GOOGLEMEET, user_id, retry).await?,
        MEET_TOOLS,
    );
    tracing::info!("Loaded {} Google Meet tools", tools.len());

    if include_drive {
        match client.list_tools(GOOGLEDRIVE, user_id).await {
            Ok(drive_tools) => {
                let drive_tools = allowed(drive_tools, DRIVE_TOOLS);
                tracing::info!("Loaded {} Google Drive tools", drive_tools.len());
                tools.extend(drive_tools);
            }
            Err(e) => tracing::warn!("Could not load Google Drive tools: {}", e),
        }
    }

    Ok(tools)
}

/// Name and short description of a tool, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

pub fn summarize_tools(tools: &[Tool]) -> Vec<ToolSummary> {
    tools
        .iter()
        .map(|tool| ToolSummary {
            name: tool.name.clone(),
            description: truncate(&tool.description, SUMMARY_DESCRIPTION_LIMIT),
        })
        .collect()
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let kept: String = text.chars().take(limit - 3).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
