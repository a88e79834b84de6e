//! Report exports: plain text, Markdown and JSON.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::source::{SourceRecord, SourceType};

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("link pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Markdown,
    Json,
}

impl ExportFormat {
    /// Accepts "txt"/"text", "md"/"markdown" and "json".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" => Some(ExportFormat::Text),
            "md" | "markdown" => Some(ExportFormat::Markdown),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    /// Guess the format from a file extension, defaulting to Markdown.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
            .unwrap_or(ExportFormat::Markdown)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

/// Source entry as written to JSON exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSource {
    pub title: String,
    pub url: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub date: String,
}

impl From<&SourceRecord> for ExportedSource {
    fn from(source: &SourceRecord) -> Self {
        Self {
            title: source.title.clone(),
            url: source.url.clone(),
            domain: source.domain.clone(),
            source_type: source.source_type,
            snippet: source.snippet.clone(),
            date: source.publication_date.clone(),
        }
    }
}

impl From<ExportedSource> for SourceRecord {
    fn from(source: ExportedSource) -> Self {
        SourceRecord {
            title: source.title,
            url: source.url,
            domain: source.domain,
            snippet: source.snippet,
            source_type: source.source_type,
            publication_date: source.date,
            ..Default::default()
        }
    }
}

/// JSON export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub content: String,
    pub sources: Vec<ExportedSource>,
    pub generated_at: DateTime<Utc>,
}

impl ReportExport {
    pub fn new(content: impl Into<String>, sources: &[SourceRecord]) -> Self {
        Self {
            content: content.into(),
            sources: sources.iter().map(ExportedSource::from).collect(),
            generated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn source_records(&self) -> Vec<SourceRecord> {
        self.sources.iter().cloned().map(SourceRecord::from).collect()
    }
}

/// Render a report in the requested format.
pub fn render(format: ExportFormat, content: &str, sources: &[SourceRecord]) -> serde_json::Result<String> {
    match format {
        ExportFormat::Text => Ok(strip_markdown(content)),
        ExportFormat::Markdown => Ok(content.to_string()),
        ExportFormat::Json => ReportExport::new(content, sources).to_json(),
    }
}

/// Render and write a report to `path`.
pub fn write_export(
    path: &Path,
    format: ExportFormat,
    content: &str,
    sources: &[SourceRecord],
) -> std::io::Result<()> {
    let rendered = render(format, content, sources)?;
    std::fs::write(path, rendered)?;
    info!(path = %path.display(), format = format.extension(), "Report exported");
    Ok(())
}

/// Markdown links reduced to their text, emphasis/heading/code markers removed.
pub fn strip_markdown(content: &str) -> String {
    let unlinked = MARKDOWN_LINK.replace_all(content, "$1");
    unlinked.chars().filter(|c| !matches!(c, '*' | '#' | '`')).collect()
}

pub fn estimate_word_count(content: &str) -> usize {
    strip_markdown(content)
        .replace(['[', ']'], "")
        .split_whitespace()
        .count()
}

/// Timestamped file name, e.g. `research_report_20240501_093000.md`.
pub fn export_filename(format: ExportFormat, at: DateTime<Local>) -> String {
    format!("research_report_{}.{}", at.format("%Y%m%d_%H%M%S"), format.extension())
}
