use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::auth::ensure_connection;
use crate::catalog::{load_tools, summarize_tools, ToolSummary};
use crate::config::Settings;
use crate::errors::{AgentError, AgentResult};
use crate::integration::composio::ComposioClient;
use crate::integration::{IntegrationClient, GOOGLEMEET};
use crate::invoker::{ToolExecutor, ToolInvoker};
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::prompt_template::system_prompt;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::base::{Provider, StopReason};

pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const MAX_TURNS_REACHED: &str = "Max turns reached without completing the task.";

/// Outcome of one query. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub data: Option<String>,
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success<S: Into<String>>(data: S) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Agent pairs the reasoning model with the meeting tools it may call
pub struct Agent {
    provider: Box<dyn Provider>,
    executor: Box<dyn ToolExecutor>,
    tools: Vec<Tool>,
    max_turns: u32,
}

impl Agent {
    pub fn new(
        provider: Box<dyn Provider>,
        executor: Box<dyn ToolExecutor>,
        tools: Vec<Tool>,
    ) -> Self {
        Self {
            provider,
            executor,
            tools,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Connect to the integration platform, make sure the user has authorized
    /// Google Meet, and load the tool catalog.
    pub async fn setup(settings: &Settings, open_browser: bool) -> AgentResult<Self> {
        let user_id = settings.google_meet_user_id.as_str();
        tracing::info!("Setting up Google Meet agent for user: {}", user_id);

        let client: Arc<dyn IntegrationClient> = Arc::new(
            ComposioClient::connect(settings.composio_config())
                .await
                .map_err(|e| {
                    AgentError::Connection(format!("Failed to reach integration platform: {}", e))
                })?,
        );

        ensure_connection(
            client.clone(),
            GOOGLEMEET,
            user_id,
            settings.oauth_timeout(),
            open_browser,
        )
        .await?;

        let retry = settings.retry_policy();
        let tools = load_tools(client.as_ref(), user_id, settings.include_drive, &retry).await?;

        let provider =
            AnthropicProvider::new(settings.provider_config())?.with_retry(retry.clone());
        let invoker = ToolInvoker::new(client, user_id, retry)?;

        tracing::info!("Agent setup complete. Loaded {} tools.", tools.len());
        Ok(Self::new(Box::new(provider), Box::new(invoker), tools)
            .with_max_turns(settings.agent_max_turns))
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn list_available_tools(&self) -> Vec<ToolSummary> {
        summarize_tools(&self.tools)
    }

    /// Run the tool-calling loop for one query, allowing at most `max_turns` model calls
    pub async fn run(&self, query: &str, max_turns: u32) -> AgentResult<String> {
        let system = system_prompt(Local::now().date_naive(), &self.tools)
            .map_err(|e| AgentError::Internal(format!("Failed to render system prompt: {}", e)))?;
        let mut messages = vec![Message::user().with_text(query)];

        for turn in 1..=max_turns {
            tracing::debug!("Agent turn {}/{}", turn, max_turns);

            let response = self
                .provider
                .complete(&system, &messages, &self.tools)
                .await?;

            match response.stop_reason {
                StopReason::ToolUse => {
                    let mut results = Message::user();
                    for request in response.message.tool_requests() {
                        let output = self.dispatch(request).await;
                        results = results.with_tool_response(request.id.clone(), output);
                    }
                    tracing::debug!("Executed {} tool calls", results.content.len());

                    messages.push(response.message);
                    messages.push(results);
                }
                StopReason::EndTurn => return Ok(response.message.text()),
                StopReason::Other(reason) => {
                    tracing::warn!("Unexpected stop reason: {}", reason);
                    break;
                }
            }
        }

        Ok(MAX_TURNS_REACHED.to_string())
    }

    /// Execute one tool request. Failures are reported to the model, never raised.
    async fn dispatch(&self, request: &ToolRequest) -> String {
        let tool_call = match &request.tool_call {
            Ok(tool_call) => tool_call,
            Err(e) => return error_envelope(e),
        };

        tracing::debug!("Executing tool: {}", tool_call.name);
        match self.executor.call(tool_call).await {
            Ok(result) => {
                serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
            }
            Err(e) => {
                tracing::error!("Tool execution error: {}", e);
                error_envelope(&e)
            }
        }
    }

    /// Answer a natural language query. Errors are folded into the response.
    pub async fn query(&self, message: &str, max_turns: Option<u32>) -> AgentResponse {
        let max_turns = max_turns.filter(|n| *n > 0).unwrap_or(self.max_turns);
        let preview: String = message.chars().take(100).collect();
        tracing::info!("Query: {}", preview);

        match self.run(message, max_turns).await {
            Ok(text) => {
                tracing::info!("Query completed successfully");
                AgentResponse::success(text)
            }
            Err(e) => {
                tracing::error!("Agent error: {}", e);
                AgentResponse::failure(e.to_string())
            }
        }
    }

    pub async fn list_conferences(&self, limit: u32) -> AgentResponse {
        self.query(
            &format!(
                "List my {} most recent Google Meet conferences. \
                 For each, show the meeting code, date/time, and duration.",
                limit
            ),
            None,
        )
        .await
    }

    pub async fn get_conference(&self, conference_id: &str) -> AgentResponse {
        self.query(
            &format!("Get full details for Google Meet conference: {}", conference_id),
            None,
        )
        .await
    }

    pub async fn get_participants(&self, conference_id: &str) -> AgentResponse {
        self.query(
            &format!(
                "List all participants who attended Google Meet conference: {}. \
                 Include their names, emails (if available), and join/leave times.",
                conference_id
            ),
            None,
        )
        .await
    }

    pub async fn get_transcript(&self, conference_id: &str) -> AgentResponse {
        self.query(
            &format!(
                "Get the full transcript for Google Meet conference: {}. \
                 Include speaker names and timestamps.",
                conference_id
            ),
            None,
        )
        .await
    }
}

fn error_envelope(error: &AgentError) -> String {
    json!({
        "error": error.kind(),
        "message": error.to_string(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::mock::MockIntegration;
    use crate::integration::{ConnectedAccount, ConnectionStatus, IntegrationError};
    use crate::models::message::MessageContent;
    use crate::models::tool::ToolCall;
    use crate::providers::base::{ProviderResponse, Usage};
    use crate::providers::mock::MockProvider;
    use crate::retry::RetryPolicy;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Executor returning scripted results and recording every call
    #[derive(Clone, Default)]
    struct ScriptedExecutor {
        results: Arc<Mutex<Vec<AgentResult<Value>>>>,
        calls: Arc<Mutex<Vec<ToolCall>>>,
    }

    impl ScriptedExecutor {
        fn new(results: Vec<AgentResult<Value>>) -> Self {
            Self {
                results: Arc::new(Mutex::new(results)),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<ToolCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolExecutor for ScriptedExecutor {
        async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value> {
            self.calls.lock().unwrap().push(tool_call.clone());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(json!({"success": true, "data": {}}))
            } else {
                results.remove(0)
            }
        }
    }

    fn tools() -> Vec<Tool> {
        vec![Tool::with_normalized_schema(
            "GOOGLEMEET_LIST_CONFERENCE_RECORDS",
            "List conference records",
            Value::Null,
        )]
    }

    fn list_request(id: &str) -> Message {
        Message::assistant().with_tool_request(
            id,
            Ok(ToolCall::new("GOOGLEMEET_LIST_CONFERENCE_RECORDS", json!({}))),
        )
    }

    fn agent(provider: &MockProvider, executor: &ScriptedExecutor) -> Agent {
        Agent::new(
            Box::new(provider.clone()),
            Box::new(executor.clone()),
            tools(),
        )
    }

    fn tool_outputs(message: &Message) -> Vec<(String, Value)> {
        message
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .map(|r| (r.id.clone(), serde_json::from_str(&r.output).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_end_turn_joins_text_blocks() -> Result<()> {
        let provider = MockProvider::new(vec![MockProvider::end_turn(
            Message::assistant().with_text("Hello").with_text("world"),
        )]);
        let executor = ScriptedExecutor::default();

        let text = agent(&provider, &executor).run("hi", 10).await?;
        assert_eq!(text, "Hello\nworld");
        assert!(executor.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_end_turn_without_text_is_empty() -> Result<()> {
        let provider = MockProvider::new(vec![MockProvider::end_turn(Message::assistant())]);
        let text = agent(&provider, &ScriptedExecutor::default())
            .run("hi", 10)
            .await?;
        assert_eq!(text, "");
        Ok(())
    }

    #[tokio::test]
    async fn test_max_turns_is_a_hard_bound() -> Result<()> {
        let provider = MockProvider::new(vec![
            MockProvider::tool_use(list_request("1")),
            MockProvider::tool_use(list_request("2")),
            MockProvider::tool_use(list_request("3")),
        ]);
        let executor = ScriptedExecutor::default();

        let response = agent(&provider, &executor).query("loop", Some(1)).await;
        assert_eq!(response, AgentResponse::success(MAX_TURNS_REACHED));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(executor.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unexpected_stop_reason_ends_loop() -> Result<()> {
        let provider = MockProvider::new(vec![ProviderResponse::new(
            Message::assistant().with_text("cut off"),
            StopReason::Other("max_tokens".to_string()),
            Usage::default(),
        )]);

        let text = agent(&provider, &ScriptedExecutor::default())
            .run("hi", 10)
            .await?;
        assert_eq!(text, MAX_TURNS_REACHED);
        assert_eq!(provider.call_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_transcript_grows_by_two_messages_per_turn() -> Result<()> {
        let provider = MockProvider::new(vec![
            MockProvider::tool_use(
                Message::assistant()
                    .with_text("Checking")
                    .with_tool_request(
                        "a",
                        Ok(ToolCall::new("GOOGLEMEET_LIST_CONFERENCE_RECORDS", json!({}))),
                    )
                    .with_tool_request(
                        "b",
                        Ok(ToolCall::new(
                            "GOOGLEMEET_GET_CONFERENCE_RECORD",
                            json!({"conference_record_id": "conferenceRecords/x"}),
                        )),
                    ),
            ),
            MockProvider::tool_use(list_request("c")),
            MockProvider::end_turn(Message::assistant().with_text("Done")),
        ]);
        let executor = ScriptedExecutor::new(vec![
            Ok(json!({"success": true, "data": {"n": 1}})),
            Ok(json!({"success": true, "data": {"n": 2}})),
            Ok(json!({"success": true, "data": {"n": 3}})),
        ]);

        let text = agent(&provider, &executor).run("meetings?", 10).await?;
        assert_eq!(text, "Done");

        let lengths: Vec<usize> = provider.transcripts().iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![1, 3, 5]);

        // tools run in the order requested and answers keep their ids
        let names: Vec<String> = executor.calls().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "GOOGLEMEET_LIST_CONFERENCE_RECORDS",
                "GOOGLEMEET_GET_CONFERENCE_RECORD",
                "GOOGLEMEET_LIST_CONFERENCE_RECORDS"
            ]
        );
        let last = provider.transcripts().pop().unwrap();
        let first_results = tool_outputs(&last[2]);
        assert_eq!(first_results[0].0, "a");
        assert_eq!(first_results[0].1["data"]["n"], 1);
        assert_eq!(first_results[1].0, "b");
        assert_eq!(first_results[1].1["data"]["n"], 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back() -> Result<()> {
        let provider = MockProvider::new(vec![
            MockProvider::tool_use(list_request("1")),
            MockProvider::end_turn(Message::assistant().with_text("That meeting does not exist")),
        ]);
        let executor = ScriptedExecutor::new(vec![Err(AgentError::api(
            "Resource not found: GOOGLEMEET_LIST_CONFERENCE_RECORDS",
            Some(404),
        ))]);

        let response = agent(&provider, &executor).query("meeting x", None).await;
        assert_eq!(response, AgentResponse::success("That meeting does not exist"));

        let transcript = provider.transcripts().pop().unwrap();
        let results = tool_outputs(&transcript[2]);
        assert_eq!(
            results[0].1,
            json!({
                "error": "GoogleMeetAPIError",
                "message": "Resource not found: GOOGLEMEET_LIST_CONFERENCE_RECORDS"
            })
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried_and_loop_continues() -> Result<()> {
        let integration = Arc::new(
            MockIntegration::new()
                .with_accounts(vec![ConnectedAccount::new(
                    "ca_meet",
                    GOOGLEMEET,
                    Some(ConnectionStatus::Active),
                )])
                .with_execute_results(vec![Err(IntegrationError::from_status(
                    404,
                    "no such record",
                    None,
                ))]),
        );
        let invoker = ToolInvoker::new(integration.clone(), "default", RetryPolicy::default())?;
        let provider = MockProvider::new(vec![
            MockProvider::tool_use(list_request("1")),
            MockProvider::end_turn(Message::assistant().with_text("Not found")),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), Box::new(invoker), tools());

        let text = agent.run("meeting?", 10).await?;
        assert_eq!(text, "Not found");
        assert_eq!(integration.execute_calls().len(), 1);

        let transcript = provider.transcripts().pop().unwrap();
        let (_, envelope) = &tool_outputs(&transcript[2])[0];
        assert_eq!(envelope["error"], "GoogleMeetAPIError");
        assert_eq!(
            envelope["message"],
            "Resource not found: GOOGLEMEET_LIST_CONFERENCE_RECORDS"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unparsed_tool_request_is_answered_without_execution() -> Result<()> {
        let provider = MockProvider::new(vec![
            MockProvider::tool_use(Message::assistant().with_tool_request(
                "bad",
                Err(AgentError::InvalidParameters("expected an object".into())),
            )),
            MockProvider::end_turn(Message::assistant().with_text("ok")),
        ]);
        let executor = ScriptedExecutor::default();

        agent(&provider, &executor).run("hi", 10).await?;
        assert!(executor.calls().is_empty());

        let transcript = provider.transcripts().pop().unwrap();
        let results = tool_outputs(&transcript[2]);
        assert_eq!(results[0].0, "bad");
        assert_eq!(results[0].1["error"], "InvalidParameters");
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failure_response() {
        let provider = MockProvider::with_results(vec![Err(AgentError::Provider {
            message: "Request failed: 529 - overloaded".to_string(),
            status: Some(529),
        })]);

        let response = agent(&provider, &ScriptedExecutor::default())
            .query("hi", None)
            .await;
        assert!(!response.success);
        assert_eq!(response.data, None);
        assert_eq!(
            response.error.as_deref(),
            Some("Claude API error: Request failed: 529 - overloaded")
        );
    }

    #[tokio::test]
    async fn test_query_uses_default_max_turns() {
        let provider = MockProvider::new(
            (0..20)
                .map(|i| MockProvider::tool_use(list_request(&i.to_string())))
                .collect(),
        );
        let agent = agent(&provider, &ScriptedExecutor::default()).with_max_turns(3);

        let response = agent.query("loop", None).await;
        assert_eq!(response.data.as_deref(), Some(MAX_TURNS_REACHED));
        assert_eq!(provider.call_count(), 3);

        // zero falls back to the configured budget
        agent.query("loop", Some(0)).await;
        assert_eq!(provider.call_count(), 6);
    }

    #[tokio::test]
    async fn test_convenience_queries() {
        let provider = MockProvider::default();
        let agent = agent(&provider, &ScriptedExecutor::default());

        agent.list_conferences(5).await;
        agent.get_participants("abc-defg-hij").await;

        let transcripts = provider.transcripts();
        assert!(transcripts[0][0]
            .text()
            .starts_with("List my 5 most recent Google Meet conferences."));
        assert!(transcripts[1][0]
            .text()
            .contains("attended Google Meet conference: abc-defg-hij."));
    }

    #[test]
    fn test_list_available_tools() {
        let agent = Agent::new(
            Box::new(MockProvider::default()),
            Box::new(ScriptedExecutor::default()),
            vec![Tool::new(
                "GOOGLEMEET_GET_TRANSCRIPTS_BY_CONFERENCE_RECORD_ID",
                "t".repeat(120),
                json!({}),
            )],
        );

        let tools = agent.list_available_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].description.len(), 100);
        assert_eq!(agent.tools().len(), 1);
    }

    #[test]
    fn test_response_shape() {
        let ok = AgentResponse::success("data");
        assert!(ok.success && ok.data.is_some() && ok.error.is_none());
        let err = AgentResponse::failure("boom");
        assert!(!err.success && err.data.is_none() && err.error.is_some());
    }
}
