use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use crate::errors::AgentResult;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderResponse, StopReason, Usage};

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<AgentResult<ProviderResponse>>>>,
    transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<AgentResult<ProviderResponse>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            transcripts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn end_turn(message: Message) -> ProviderResponse {
        ProviderResponse::new(message, StopReason::EndTurn, Usage::default())
    }

    pub fn tool_use(message: Message) -> ProviderResponse {
        ProviderResponse::new(message, StopReason::ToolUse, Usage::default())
    }

    /// The transcript passed to every call made so far
    pub fn transcripts(&self) -> Vec<Vec<Message>> {
        self.transcripts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> AgentResult<ProviderResponse> {
        self.transcripts.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok(Self::end_turn(Message::assistant().with_text("")))
        } else {
            responses.remove(0)
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
