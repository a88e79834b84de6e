//! MCP tool server for deep-researcher.
//!
//! Exposes research, source inspection and citation formatting as MCP tools
//! over stdio. Every tool answers with text; failures are reported in the
//! text rather than as protocol errors.

use std::sync::{Arc, Mutex};

use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dr_agents::ResearchDriver;
use dr_core::Error;
use dr_research::{format_citations, group_by_type, CitationStyle, SourceRecord, SourceStatistics, SourceType};

const ACADEMIC_HINTS: &str = r#"site:arxiv.org OR site:pubmed.ncbi.nlm.nih.gov OR site:scholar.google.com OR "research paper" OR "peer reviewed" OR "study" OR "journal article""#;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResearchArgs {
    /// The research query or question.
    pub query: String,
    /// Whether to append detailed information about every source (default true).
    #[serde(default)]
    pub include_sources: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FormatCitationsArgs {
    /// The research content with in-text citations.
    pub content: String,
    /// Citation style: apa (default), mla, or anything else for a plain list.
    #[serde(default)]
    pub citation_style: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AcademicSearchArgs {
    /// The search query focused on academic content.
    pub query: String,
    /// Maximum number of academic sources to list (default 10).
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Clone)]
pub struct ResearchServer {
    tool_router: ToolRouter<Self>,
    driver: Arc<ResearchDriver>,
    last_sources: Arc<Mutex<Vec<SourceRecord>>>,
}

fn text_result(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl ResearchServer {
    pub fn new(driver: Arc<ResearchDriver>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            driver,
            last_sources: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[tool(description = "Run multi-source research on a query and return a cited report with source links")]
    async fn research(&self, Parameters(args): Parameters<ResearchArgs>) -> Result<CallToolResult, McpError> {
        text_result(self.research_text(&args.query, args.include_sources.unwrap_or(true)).await)
    }

    #[tool(description = "Get detailed JSON information about the sources from the last research session")]
    async fn get_sources(&self) -> Result<CallToolResult, McpError> {
        text_result(self.sources_text())
    }

    #[tool(description = "Get statistics about source types, domains and metadata completeness from the last research session")]
    async fn get_source_statistics(&self) -> Result<CallToolResult, McpError> {
        text_result(self.statistics_text())
    }

    #[tool(description = "Append a references section in the given citation style (apa, mla, plain) using the last session's sources")]
    async fn format_citations(
        &self,
        Parameters(args): Parameters<FormatCitationsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let style = args.citation_style.as_deref().unwrap_or("apa");
        text_result(self.citations_text(&args.content, style))
    }

    #[tool(description = "Research a query with an academic focus and list the academic papers found")]
    async fn search_academic_papers(
        &self,
        Parameters(args): Parameters<AcademicSearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        text_result(
            self.academic_text(&args.query, args.max_results.unwrap_or(10))
                .await,
        )
    }
}

impl ResearchServer {
    fn remember(&self, sources: &[SourceRecord]) {
        *self.last_sources.lock().unwrap_or_else(|e| e.into_inner()) = sources.to_vec();
    }

    fn sources(&self) -> Vec<SourceRecord> {
        self.last_sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn research_text(&self, query: &str, include_sources: bool) -> String {
        info!(query = %query, include_sources, "MCP research");
        let report = self.driver.research(query).await;
        self.remember(&report.sources);

        let mut text = report.content;
        if include_sources {
            text.push_str(&detailed_source_information(&report.sources));
        }
        text
    }

    pub fn sources_text(&self) -> String {
        let sources = self.sources();
        if sources.is_empty() {
            return "No sources available from recent research session.".to_string();
        }
        match serde_json::to_string_pretty(&SourcesInfo::new(&sources)) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize sources");
                format!("Error getting source information: {}", e)
            }
        }
    }

    pub fn statistics_text(&self) -> String {
        SourceStatistics::compute(&self.sources()).render_markdown()
    }

    pub fn citations_text(&self, content: &str, style: &str) -> String {
        format_citations(content, &self.sources(), CitationStyle::parse(style))
    }

    pub async fn academic_text(&self, query: &str, max_results: usize) -> String {
        let academic_query = format!("{} {}", query, ACADEMIC_HINTS);
        info!(query = %query, max_results, "MCP academic search");
        let report = self.driver.research(&academic_query).await;
        self.remember(&report.sources);

        let academic: Vec<&SourceRecord> = report
            .sources
            .iter()
            .filter(|s| s.source_type == SourceType::Academic)
            .take(max_results)
            .collect();

        let mut text = report.content;
        if !academic.is_empty() {
            text.push_str("\n\n---\n\n## Academic Sources Found\n\n");
            for (i, source) in academic.iter().enumerate() {
                text.push_str(&format!("**{}. {}**\n", i + 1, source.title));
                text.push_str(&format!("- **URL**: {}\n", source.url));
                text.push_str(&format!("- **Domain**: {}\n", source.domain));
                if !source.authors.is_empty() {
                    text.push_str(&format!("- **Authors**: {}\n", source.authors.join(", ")));
                }
                if !source.journal.is_empty() {
                    text.push_str(&format!("- **Journal**: {}\n", source.journal));
                }
                if !source.doi.is_empty() {
                    text.push_str(&format!("- **DOI**: {}\n", source.doi));
                }
                if !source.publication_date.is_empty() {
                    text.push_str(&format!("- **Publication Date**: {}\n", source.publication_date));
                }
                if !source.snippet.is_empty() {
                    text.push_str(&format!("- **Abstract/Snippet**: {}...\n", clip(&source.snippet, 200)));
                }
                text.push('\n');
            }
        }
        text
    }
}

#[tool_handler]
impl rmcp::ServerHandler for ResearchServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.instructions = Some(
            "Multi-source research with source tracking. Run `research` first; `get_sources`, \
             `get_source_statistics` and `format_citations` work on the sources of the last run."
                .to_string(),
        );
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }
}

/// JSON shape returned by `get_sources`.
#[derive(Debug, Serialize)]
struct SourcesInfo<'a> {
    total_sources: usize,
    source_types: serde_json::Map<String, serde_json::Value>,
    sources_by_type: serde_json::Map<String, serde_json::Value>,
    all_sources: &'a [SourceRecord],
}

impl<'a> SourcesInfo<'a> {
    fn new(sources: &'a [SourceRecord]) -> Self {
        let mut source_types = serde_json::Map::new();
        let mut sources_by_type = serde_json::Map::new();
        for (source_type, members) in group_by_type(sources) {
            source_types.insert(source_type.to_string(), members.len().into());
            sources_by_type.insert(
                source_type.to_string(),
                serde_json::to_value(&members).unwrap_or_default(),
            );
        }
        Self {
            total_sources: sources.len(),
            source_types,
            sources_by_type,
            all_sources: sources,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Per-type source listing appended to MCP research results.
fn detailed_source_information(sources: &[SourceRecord]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n\n---\n\n## Detailed Source Information\n\n");
    for (source_type, members) in group_by_type(sources) {
        out.push_str(&format!("\n### {} Sources ({})\n\n", source_type.label(), members.len()));
        for (i, source) in members.iter().enumerate() {
            out.push_str(&format!("**{}. {}**\n", i + 1, source.title));
            out.push_str(&format!("- **URL**: {}\n", source.url));
            out.push_str(&format!("- **Domain**: {}\n", source.domain));
            out.push_str(&format!("- **Type**: {}\n", source.source_type));
            if !source.snippet.is_empty() {
                out.push_str(&format!("- **Snippet**: {}...\n", clip(&source.snippet, 150)));
            }
            if !source.publication_date.is_empty() {
                out.push_str(&format!("- **Date**: {}\n", source.publication_date));
            }
            if !source.authors.is_empty() {
                out.push_str(&format!("- **Authors**: {}\n", source.authors.join(", ")));
            }
            if !source.journal.is_empty() {
                out.push_str(&format!("- **Journal**: {}\n", source.journal));
            }
            if !source.doi.is_empty() {
                out.push_str(&format!("- **DOI**: {}\n", source.doi));
            }
            out.push('\n');
        }
    }
    out
}

/// Serve the research tools over stdio until the client disconnects.
pub async fn serve_stdio(driver: Arc<ResearchDriver>) -> Result<(), Error> {
    info!("Starting MCP server on stdio");
    let running = ResearchServer::new(driver)
        .serve(stdio())
        .await
        .map_err(|e| Error::Unknown(format!("MCP server failed to start: {}", e)))?;
    running
        .waiting()
        .await
        .map_err(|e| Error::Unknown(format!("MCP server terminated: {}", e)))?;
    info!("MCP client disconnected");
    Ok(())
}
