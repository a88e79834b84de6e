//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<Result<CompletionResponse, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
    pub default_model: Option<String>,
    tool_call_counter: Mutex<usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: None,
            tool_call_counter: Mutex::new(0),
        }
    }

    fn response(message: Message, finish_reason: FinishReason) -> CompletionResponse {
        CompletionResponse {
            message,
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason,
        }
    }

    /// Queue a text response for the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.queue_raw_response(Ok(Self::response(
            Message::assistant(content),
            FinishReason::Stop,
        )));
    }

    /// Queue a response consisting of a single tool call.
    pub fn queue_tool_call(&self, name: &str, arguments: serde_json::Value) {
        let id = {
            let mut counter = self.tool_call_counter.lock().unwrap();
            *counter += 1;
            format!("mock_tc_{}", counter)
        };
        let message = Message::assistant_with_tool_calls("", vec![ToolCall::new(id, name, arguments)]);
        self.queue_raw_response(Ok(Self::response(message, FinishReason::ToolCalls)));
    }

    /// Queue an error for the next complete() call.
    pub fn queue_error(&self, error: Error) {
        self.queue_raw_response(Err(error));
    }

    pub fn queue_raw_response(&self, response: Result<CompletionResponse, Error>) {
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    /// Number of responses still queued.
    pub fn pending(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(response) => response,
            None => Err(Error::Unknown("No mock response queued".to_string())),
        }
    }
}
