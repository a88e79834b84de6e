//! The researcher's search tool: quota, query enhancement and source tracking.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use dr_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};
use dr_research::{extract_sources, lock_session, SessionHandle, DEFAULT_MAX_RAW_URLS};

use crate::linkup::{OutputType, SearchClient, SearchDepth, SearchFocus, SearchRequest};

pub const SEARCH_TOOL_NAME: &str = "linkup_search";

#[derive(Debug, Clone)]
pub struct SearchToolConfig {
    /// Pause before every search call.
    pub delay: Duration,
    pub max_raw_urls: usize,
    /// Response text beyond this many characters is cut before it reaches the model.
    pub truncate_chars: usize,
}

impl Default for SearchToolConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
            max_raw_urls: DEFAULT_MAX_RAW_URLS,
            truncate_chars: 5000,
        }
    }
}

pub struct SearchTool {
    client: Arc<dyn SearchClient>,
    session: SessionHandle,
    config: SearchToolConfig,
}

impl SearchTool {
    pub fn new(client: Arc<dyn SearchClient>, session: SessionHandle) -> Self {
        Self {
            client,
            session,
            config: SearchToolConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SearchToolConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    depth: Option<String>,
    #[serde(default)]
    output_type: Option<String>,
    #[serde(default)]
    focus: Option<String>,
}

fn truncate_chars(text: &str, limit: usize) -> Option<&str> {
    text.char_indices().nth(limit).map(|(idx, _)| &text[..idx])
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web with source tracking. Use 'focus' to target academic papers, news or technical documentation."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new()
                .add_property("query", PropertySchema::string("The search query to perform"), true)
                .add_property(
                    "depth",
                    PropertySchema::enum_string("Depth of search", &["standard", "deep"])
                        .with_default(serde_json::json!("standard")),
                    false,
                )
                .add_property(
                    "output_type",
                    PropertySchema::enum_string(
                        "Output type",
                        &["searchResults", "sourcedAnswer", "structured"],
                    )
                    .with_default(serde_json::json!("searchResults")),
                    false,
                )
                .add_property(
                    "focus",
                    PropertySchema::enum_string("Focus area", &["general", "academic", "news", "technical"])
                        .with_default(serde_json::json!("general")),
                    false,
                ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: SearchArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool(SEARCH_TOOL_NAME, format!("Invalid arguments: {}", e)))?;

        let max_searches = {
            let session = lock_session(&self.session);
            if session.quota_reached() {
                info!(max = session.max_searches(), "Search quota reached");
                return Ok(ToolOutput::success(format!(
                    "Maximum search limit ({}) reached. Please analyze existing results.",
                    session.max_searches()
                )));
            }
            session.max_searches()
        };

        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        let focus = SearchFocus::parse(args.focus.as_deref().unwrap_or("general"));
        let requested = SearchDepth::parse(args.depth.as_deref().unwrap_or("standard"));
        let depth = focus.resolve_depth(&args.query, requested);
        let request = SearchRequest::new(focus.enhance_query(&args.query))
            .with_depth(depth)
            .with_output_type(OutputType::parse(args.output_type.as_deref().unwrap_or("searchResults")));

        let response = self.client.search(&request).await.map_err(|e| {
            warn!(error = %e, query = %args.query, "Search failed");
            Error::tool(SEARCH_TOOL_NAME, format!("Error during search: {}", e))
        })?;

        let sources = extract_sources(&response, self.config.max_raw_urls).into_sources();
        let found = sources.len();
        let count = {
            let mut session = lock_session(&self.session);
            let count = session.increment();
            session.extend(sources);
            count
        };

        debug!(
            search = count,
            max = max_searches,
            depth = depth.as_str(),
            focus = focus.as_str(),
            sources = found,
            "Search complete"
        );

        let text = response.display_text();
        let body = match truncate_chars(&text, self.config.truncate_chars) {
            Some(head) => format!(
                "{}\n... [Results truncated, search {} using {} depth]",
                head,
                count,
                depth.as_str()
            ),
            None => text,
        };

        Ok(ToolOutput::success(format!(
            "Search {}/{} ({} depth) - Focus: {}:\n{}\n\nSources found: {}",
            count,
            max_searches,
            depth.as_str(),
            focus.as_str(),
            body,
            found
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSearchClient;
    use dr_research::new_handle;

    const TWO_RESULTS: &str = r#"{"results": [
        {"name": "Paper", "url": "https://arxiv.org/abs/1", "content": "abstract"},
        {"name": "Repo", "url": "https://github.com/a/b", "content": "readme"}
    ]}"#;

    fn no_delay() -> SearchToolConfig {
        SearchToolConfig {
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let client = Arc::new(ScriptedSearchClient::repeating(TWO_RESULTS));
        let session = new_handle(8);
        let tool = SearchTool::new(client.clone(), session.clone()).with_config(no_delay());

        for i in 1..=8u32 {
            let out = tool.execute(serde_json::json!({"query": "rust"})).await.unwrap();
            assert!(out.content.starts_with(&format!("Search {}/8", i)), "{}", out.content);
            assert_eq!(lock_session(&session).search_count(), i);
        }

        let out = tool.execute(serde_json::json!({"query": "rust"})).await.unwrap();
        assert_eq!(out.content, "Maximum search limit (8) reached. Please analyze existing results.");
        assert!(!out.is_error);
        assert_eq!(lock_session(&session).search_count(), 8);
        assert_eq!(lock_session(&session).all().len(), 16);
        assert_eq!(client.request_count(), 8);
    }

    #[tokio::test]
    async fn test_focus_and_depth_reach_client() {
        let client = Arc::new(ScriptedSearchClient::repeating(TWO_RESULTS));
        let tool = SearchTool::new(client.clone(), new_handle(8)).with_config(no_delay());

        let out = tool
            .execute(serde_json::json!({"query": "llm agents", "focus": "technical"}))
            .await
            .unwrap();
        assert!(out.content.starts_with("Search 1/8 (deep depth) - Focus: technical:\n"));
        assert!(out.content.ends_with("\n\nSources found: 2"));

        let request = client.last_request().unwrap();
        assert_eq!(request.depth, SearchDepth::Deep);
        assert!(request.query.starts_with("llm agents site:github.com"));
    }

    #[tokio::test]
    async fn test_sourced_answer_sources_tracked() {
        let body = r#"{"answer":"Rust is fast","sources":[{"name":"Rust Book","url":"https://doc.rust-lang.org/book","snippet":"The book about Rust"}]}"#;
        let client = Arc::new(ScriptedSearchClient::repeating(body));
        let session = new_handle(8);
        let tool = SearchTool::new(client, session.clone()).with_config(no_delay());

        let out = tool
            .execute(serde_json::json!({"query": "rust", "output_type": "sourcedAnswer"}))
            .await
            .unwrap();
        assert!(out.content.ends_with("\n\nSources found: 1"));

        let sources = lock_session(&session).all().to_vec();
        assert_eq!(sources[0].url, "https://doc.rust-lang.org/book");
        assert_eq!(sources[0].title, "Rust Book");
    }

    #[tokio::test]
    async fn test_long_responses_truncated() {
        let body = format!("see https://example.com {}", "x".repeat(6000));
        let client = Arc::new(ScriptedSearchClient::repeating(&body));
        let tool = SearchTool::new(client, new_handle(8)).with_config(no_delay());

        let out = tool.execute(serde_json::json!({"query": "q"})).await.unwrap();
        assert!(out
            .content
            .contains("\n... [Results truncated, search 1 using standard depth]\n\nSources found: 1"));
    }

    #[tokio::test]
    async fn test_failure_does_not_count() {
        let client = Arc::new(ScriptedSearchClient::new());
        client.queue_error(Error::rate_limit("429"));
        let session = new_handle(8);
        let tool = SearchTool::new(client, session.clone()).with_config(no_delay());

        let err = tool.execute(serde_json::json!({"query": "q"})).await.unwrap_err();
        assert!(err.to_string().contains("Error during search"));
        assert_eq!(lock_session(&session).search_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let client = Arc::new(ScriptedSearchClient::repeating(TWO_RESULTS));
        let tool = SearchTool::new(client, new_handle(8)).with_config(no_delay());
        assert!(tool.execute(serde_json::json!({"focus": "news"})).await.is_err());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), Some("hé"));
        assert_eq!(truncate_chars("hi", 5), None);
    }
}
