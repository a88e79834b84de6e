//! One-shot agent loop.
//!
//! An agent is a system prompt plus a tool set. `Agent::run_once` sends the
//! task to the provider, executes any requested tool calls, feeds the results
//! back, and repeats until the model answers without calling a tool.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{CompletionRequest, Provider};
use crate::tool::ToolRegistry;

/// Unique identifier for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Unique agent identifier.
    pub id: AgentId,
    /// System prompt for the agent.
    pub system_prompt: Option<String>,
    /// Maximum agentic loop iterations.
    pub max_iterations: usize,
    /// Model override for every request this agent makes.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// When set, running out of iterations asks once more, without tools,
    /// for a final answer instead of failing.
    pub final_answer_prompt: Option<String>,
}

impl AgentConfig {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            max_iterations: 20,
            model: None,
            temperature: None,
            max_tokens: None,
            final_answer_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_final_answer_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.final_answer_prompt = Some(prompt.into());
        self
    }

    fn request(&self, messages: Vec<Message>, tools: &ToolRegistry) -> CompletionRequest {
        let mut request = CompletionRequest::new(messages).with_tools(tools.definitions());
        request.model = self.model.clone();
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }
}

/// Events emitted during agent execution for progress reporting.
#[derive(Debug, Clone)]
pub enum AgentProgressEvent {
    /// An iteration of the agent loop has started.
    IterationStart {
        agent_name: String,
        iteration: u32,
        max_iterations: u32,
    },
    /// A tool execution has started.
    ToolStart {
        agent_name: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// A tool execution has completed.
    ToolComplete {
        agent_name: String,
        tool_name: String,
        is_error: bool,
    },
    /// Usage statistics update after an LLM call.
    UsageUpdate { agent_name: String, usage: Usage },
}

/// Handler for receiving agent progress events.
#[async_trait]
pub trait AgentProgressHandler: Send + Sync {
    async fn on_progress(&self, event: AgentProgressEvent);
}

pub struct Agent;

impl Agent {
    /// Run a one-shot task with the given context.
    ///
    /// The agent runs until it produces a final response (no tool calls).
    pub async fn run_once(
        provider: Arc<dyn Provider>,
        tools: &ToolRegistry,
        config: &AgentConfig,
        context: Vec<Message>,
    ) -> Result<String, Error> {
        Self::run_once_with_progress(provider, tools, config, context, None).await
    }

    /// Run a one-shot task, reporting iterations, tool calls and usage.
    pub async fn run_once_with_progress(
        provider: Arc<dyn Provider>,
        tools: &ToolRegistry,
        config: &AgentConfig,
        context: Vec<Message>,
        progress: Option<&Arc<dyn AgentProgressHandler>>,
    ) -> Result<String, Error> {
        let agent_name = config.id.0.clone();

        debug!(
            agent = %config.id,
            context_messages = context.len(),
            tools_available = tools.len(),
            "Agent run_once starting"
        );

        let mut messages = Vec::new();
        if let Some(system) = &config.system_prompt {
            messages.push(Message::system(system.as_str()));
        }
        messages.extend(context);

        let max_iterations = config.max_iterations as u32;

        for iteration in 0..config.max_iterations {
            if let Some(handler) = progress {
                handler
                    .on_progress(AgentProgressEvent::IterationStart {
                        agent_name: agent_name.clone(),
                        iteration: iteration as u32 + 1,
                        max_iterations,
                    })
                    .await;
            }

            debug!(
                agent = %config.id,
                iteration = iteration,
                message_count = messages.len(),
                "Agent iteration starting"
            );

            let request = config.request(messages.clone(), tools);
            let response = provider.complete(request).await?;

            if let Some(handler) = progress {
                handler
                    .on_progress(AgentProgressEvent::UsageUpdate {
                        agent_name: agent_name.clone(),
                        usage: response.usage.clone(),
                    })
                    .await;
            }

            let tool_calls = response.message.tool_calls;
            if tool_calls.is_empty() {
                let content = response.message.content.into_string();
                debug!(
                    agent = %config.id,
                    iterations = iteration + 1,
                    response_len = content.len(),
                    "Agent completed successfully"
                );
                return Ok(content);
            }

            debug!(
                agent = %config.id,
                tool_count = tool_calls.len(),
                "Agent executing tools"
            );

            messages.push(Message::assistant_with_tool_calls("", tool_calls.clone()));

            for tool_call in &tool_calls {
                if let Some(handler) = progress {
                    handler
                        .on_progress(AgentProgressEvent::ToolStart {
                            agent_name: agent_name.clone(),
                            tool_name: tool_call.name.clone(),
                            arguments: tool_call.arguments.clone(),
                        })
                        .await;
                }

                let (result, is_error) = execute_tool(tools, tool_call).await;

                if let Some(handler) = progress {
                    handler
                        .on_progress(AgentProgressEvent::ToolComplete {
                            agent_name: agent_name.clone(),
                            tool_name: tool_call.name.clone(),
                            is_error,
                        })
                        .await;
                }

                messages.push(Message::tool_result(&tool_call.id, result));
            }
        }

        let Some(prompt) = &config.final_answer_prompt else {
            return Err(Error::Unknown(format!(
                "Agent {} exceeded max iterations ({})",
                config.id, config.max_iterations
            )));
        };

        warn!(
            agent = %config.id,
            max_iterations = config.max_iterations,
            "Iteration limit reached, requesting final answer"
        );
        messages.push(Message::user(prompt.as_str()));
        let response = provider
            .complete(config.request(messages, &ToolRegistry::new()))
            .await?;

        if let Some(handler) = progress {
            handler
                .on_progress(AgentProgressEvent::UsageUpdate {
                    agent_name,
                    usage: response.usage.clone(),
                })
                .await;
        }

        Ok(response.message.content.into_string())
    }
}

/// Execute a single tool call. Failures become text for the model to read.
async fn execute_tool(registry: &ToolRegistry, tool_call: &ToolCall) -> (String, bool) {
    let Some(tool) = registry.get(&tool_call.name) else {
        return (format!("Error: Unknown tool '{}'", tool_call.name), true);
    };

    match tool.execute(tool_call.arguments.clone()).await {
        Ok(output) if output.is_error => (format!("Error: {}", output.content), true),
        Ok(output) => (output.content, false),
        Err(e) => (format!("Error executing tool: {}", e), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use crate::tool::{Tool, ToolDefinition, ToolOutput};
    use std::sync::Mutex;

    struct CountingTool {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "count"
        }

        fn description(&self) -> &str {
            "Count invocations"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name(), self.description())
        }

        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, Error> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(ToolOutput::success(format!("call {}", calls)))
        }
    }

    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl AgentProgressHandler for Recorder {
        async fn on_progress(&self, event: AgentProgressEvent) {
            let label = match event {
                AgentProgressEvent::IterationStart { iteration, .. } => format!("iter {}", iteration),
                AgentProgressEvent::ToolStart { tool_name, .. } => format!("start {}", tool_name),
                AgentProgressEvent::ToolComplete { tool_name, is_error, .. } => {
                    format!("done {} {}", tool_name, is_error)
                }
                AgentProgressEvent::UsageUpdate { .. } => "usage".to_string(),
            };
            self.0.lock().unwrap().push(label);
        }
    }

    #[test]
    fn test_agent_config() {
        let config = AgentConfig::new("researcher")
            .with_system_prompt("You are a researcher")
            .with_max_iterations(4)
            .with_model("gemini-2.5-pro")
            .with_temperature(0.3);

        assert_eq!(config.id.0, "researcher");
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(config.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_run_once_executes_tools_until_final_answer() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("count", serde_json::json!({}));
        provider.queue_response("final answer");

        let tools = ToolRegistry::new().with_tool(Box::new(CountingTool {
            calls: Mutex::new(0),
        }));
        let config = AgentConfig::new("tester").with_system_prompt("system");

        let result = Agent::run_once(provider.clone(), &tools, &config, vec![Message::user("go")])
            .await
            .unwrap();

        assert_eq!(result, "final answer");
        assert_eq!(provider.request_count(), 2);
        let last = provider.last_request().unwrap();
        // system, user, assistant tool call, tool result
        assert_eq!(last.messages.len(), 4);
        assert_eq!(last.messages[3].content.as_text(), "call 1");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("missing", serde_json::json!({}));
        provider.queue_response("ok");

        let tools = ToolRegistry::new();
        let config = AgentConfig::new("tester");
        let result = Agent::run_once(provider.clone(), &tools, &config, vec![Message::user("go")])
            .await
            .unwrap();

        assert_eq!(result, "ok");
        let last = provider.last_request().unwrap();
        assert!(last.messages[2].content.as_text().contains("Unknown tool 'missing'"));
    }

    #[tokio::test]
    async fn test_max_iterations_exceeded() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("count", serde_json::json!({}));
        provider.queue_tool_call("count", serde_json::json!({}));

        let tools = ToolRegistry::new().with_tool(Box::new(CountingTool {
            calls: Mutex::new(0),
        }));
        let config = AgentConfig::new("tester").with_max_iterations(2);
        let err = Agent::run_once(provider, &tools, &config, vec![Message::user("go")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exceeded max iterations"));
    }

    #[tokio::test]
    async fn test_final_answer_after_iteration_limit() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("count", serde_json::json!({}));
        provider.queue_tool_call("count", serde_json::json!({}));
        provider.queue_response("best effort");

        let tools = ToolRegistry::new().with_tool(Box::new(CountingTool {
            calls: Mutex::new(0),
        }));
        let config = AgentConfig::new("tester")
            .with_max_iterations(2)
            .with_final_answer_prompt("Summarize now.");
        let result = Agent::run_once(provider.clone(), &tools, &config, vec![Message::user("go")])
            .await
            .unwrap();

        assert_eq!(result, "best effort");
        assert_eq!(provider.request_count(), 3);
        let last = provider.last_request().unwrap();
        assert!(last.tools.is_empty());
        assert_eq!(last.messages.last().unwrap().content.as_text(), "Summarize now.");
    }

    #[tokio::test]
    async fn test_progress_events() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("count", serde_json::json!({}));
        provider.queue_response("done");

        let tools = ToolRegistry::new().with_tool(Box::new(CountingTool {
            calls: Mutex::new(0),
        }));
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handler: Arc<dyn AgentProgressHandler> = recorder.clone();
        let config = AgentConfig::new("tester");

        Agent::run_once_with_progress(
            provider,
            &tools,
            &config,
            vec![Message::user("go")],
            Some(&handler),
        )
        .await
        .unwrap();

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["iter 1", "usage", "start count", "done count false", "iter 2", "usage"]
        );
    }
}
