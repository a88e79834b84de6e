use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use dr_core::{Agent, AgentConfig, AgentProgressHandler, Error, Message, Provider, ToolRegistry};
use dr_research::{lock_session, SessionHandle};
use dr_tools::{SearchClient, SearchTool, SearchToolConfig};

use crate::researcher::{research_task, ResearcherAgent};
use crate::writer::{writing_task, WriterAgent};
use crate::InternalAgent;

/// A research run: query in, report body out. Sources go to the session.
#[async_trait]
pub trait ResearchPipeline: Send + Sync {
    async fn run(&self, query: &str, session: &SessionHandle) -> Result<String, Error>;
}

/// Model parameters and loop limits shared by both stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub researcher_max_turns: Option<usize>,
    pub writer_max_turns: Option<usize>,
    pub search: SearchToolConfig,
}

impl PipelineSettings {
    fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }
}

/// Researcher with the search tool, then writer without tools.
pub struct AgentPipeline {
    provider: Arc<dyn Provider>,
    search_client: Arc<dyn SearchClient>,
    settings: PipelineSettings,
    progress: Option<Arc<dyn AgentProgressHandler>>,
}

impl AgentPipeline {
    pub fn new(provider: Arc<dyn Provider>, search_client: Arc<dyn SearchClient>) -> Self {
        Self {
            provider,
            search_client,
            settings: PipelineSettings::default(),
            progress: None,
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn AgentProgressHandler>) -> Self {
        self.progress = Some(handler);
        self
    }

    fn researcher(&self) -> ResearcherAgent {
        match self.settings.researcher_max_turns {
            Some(turns) => ResearcherAgent::new().with_max_turns(turns),
            None => ResearcherAgent::new(),
        }
    }

    fn writer(&self) -> WriterAgent {
        match self.settings.writer_max_turns {
            Some(turns) => WriterAgent::new().with_max_turns(turns),
            None => WriterAgent::new(),
        }
    }
}

#[async_trait]
impl ResearchPipeline for AgentPipeline {
    async fn run(&self, query: &str, session: &SessionHandle) -> Result<String, Error> {
        let researcher = self.researcher();
        let tools = ToolRegistry::new().with_tool(Box::new(
            SearchTool::new(Arc::clone(&self.search_client), Arc::clone(session))
                .with_config(self.settings.search.clone()),
        ));

        info!(query = %query, "Research stage starting");
        let findings = Agent::run_once_with_progress(
            Arc::clone(&self.provider),
            &tools,
            &self.settings.apply(researcher.agent_config()),
            vec![Message::user(research_task(query))],
            self.progress.as_ref(),
        )
        .await?;

        let sources = lock_session(session).all().to_vec();
        debug!(
            findings_len = findings.len(),
            sources = sources.len(),
            "Research stage complete"
        );

        let writer = self.writer();
        info!(sources = sources.len(), "Writing stage starting");
        let report = Agent::run_once_with_progress(
            Arc::clone(&self.provider),
            &ToolRegistry::new(),
            &self.settings.apply(writer.agent_config()),
            vec![Message::user(writing_task(query, &findings, &sources))],
            self.progress.as_ref(),
        )
        .await?;

        debug!(report_len = report.len(), "Writing stage complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::testing::MockProvider;
    use dr_core::Role;
    use dr_research::new_handle;
    use dr_tools::testing::ScriptedSearchClient;
    use std::time::Duration;

    const RESULTS: &str = r#"{"results": [
        {"name": "Survey of LLM agents", "url": "https://arxiv.org/abs/2401.1", "content": "survey"}
    ]}"#;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            model: Some("gemini-2.5-flash".into()),
            temperature: Some(0.3),
            search: SearchToolConfig {
                delay: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_two_stage_run() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("linkup_search", serde_json::json!({"query": "llm agents", "focus": "academic"}));
        provider.queue_response("Findings: agents are popular [arxiv]");
        provider.queue_response("# Report\n\nAgents are popular [1].");

        let search = Arc::new(ScriptedSearchClient::repeating(RESULTS));
        let pipeline = AgentPipeline::new(provider.clone(), search.clone()).with_settings(settings());
        let session = new_handle(8);

        let report = pipeline.run("llm agents", &session).await.unwrap();
        assert_eq!(report, "# Report\n\nAgents are popular [1].");
        assert_eq!(search.request_count(), 1);
        assert_eq!(lock_session(&session).search_count(), 1);
        assert_eq!(lock_session(&session).all().len(), 1);

        // writer request carries the findings and the numbered sources, and no tools
        let writer_request = provider.last_request().unwrap();
        assert!(writer_request.tools.is_empty());
        assert_eq!(writer_request.model.as_deref(), Some("gemini-2.5-flash"));
        let task = writer_request
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .unwrap()
            .content
            .as_text()
            .to_string();
        assert!(task.contains("Findings: agents are popular"));
        assert!(task.contains("[1] Survey of LLM agents - https://arxiv.org/abs/2401.1 (academic)"));
    }

    #[tokio::test]
    async fn test_researcher_sees_search_tool() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("nothing to search");
        provider.queue_response("report");

        let search = Arc::new(ScriptedSearchClient::repeating(RESULTS));
        let pipeline = AgentPipeline::new(provider.clone(), search).with_settings(settings());
        pipeline.run("q", &new_handle(8)).await.unwrap();

        let requests = provider.captured_requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "linkup_search");
    }

    #[tokio::test]
    async fn test_turn_limit_still_reaches_writer() {
        let provider = Arc::new(MockProvider::new());
        for _ in 0..12 {
            provider.queue_tool_call("linkup_search", serde_json::json!({"query": "rust"}));
        }
        provider.queue_response("Findings from eight searches");
        provider.queue_response("# Report [1]");

        let search = Arc::new(ScriptedSearchClient::repeating(RESULTS));
        let pipeline = AgentPipeline::new(provider.clone(), search.clone()).with_settings(settings());
        let session = new_handle(8);

        let report = pipeline.run("rust", &session).await.unwrap();
        assert_eq!(report, "# Report [1]");
        assert_eq!(search.request_count(), 8);
        assert_eq!(lock_session(&session).search_count(), 8);
        assert_eq!(lock_session(&session).all().len(), 8);

        let requests = provider.captured_requests.lock().unwrap();
        assert_eq!(requests.len(), 14);
        // turn-limit request goes out without tools
        assert!(requests[12].tools.is_empty());
        let writer_task = requests[13]
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .unwrap()
            .content
            .as_text()
            .to_string();
        assert!(writer_task.contains("Findings from eight searches"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::rate_limit("quota"));

        let search = Arc::new(ScriptedSearchClient::repeating(RESULTS));
        let pipeline = AgentPipeline::new(provider, search).with_settings(settings());
        let err = pipeline.run("q", &new_handle(8)).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
