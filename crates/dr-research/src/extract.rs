//! Turning raw search responses into source records.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::{classify, extract_domain, SourceRecord};

pub const DEFAULT_MAX_RAW_URLS: usize = 10;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s)]+(?:\([^)]*\))?[^\s)]*").expect("URL pattern is valid")
});

/// Shape of a search service response, decided once when the body arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResponse {
    Structured { results: Vec<serde_json::Value> },
    /// Answer text with the sources it was built from.
    SourcedAnswer {
        answer: String,
        sources: Vec<serde_json::Value>,
    },
    RawText(String),
}

impl SearchResponse {
    /// A JSON object carrying a `results` array is structured, one carrying a
    /// `sources` array is a sourced answer; anything else is text.
    pub fn from_body(body: &str) -> Self {
        if let Ok(serde_json::Value::Object(mut map)) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(serde_json::Value::Array(results)) = map.remove("results") {
                return SearchResponse::Structured { results };
            }
            if let Some(serde_json::Value::Array(sources)) = map.remove("sources") {
                let answer = match map.remove("answer") {
                    Some(serde_json::Value::String(answer)) => answer,
                    _ => String::new(),
                };
                return SearchResponse::SourcedAnswer { answer, sources };
            }
        }
        SearchResponse::RawText(body.to_string())
    }

    /// Text handed back to the model.
    pub fn display_text(&self) -> String {
        match self {
            SearchResponse::Structured { results } => {
                serde_json::to_string_pretty(&serde_json::json!({ "results": results }))
                    .unwrap_or_default()
            }
            SearchResponse::SourcedAnswer { answer, sources } => {
                serde_json::to_string_pretty(&serde_json::json!({ "answer": answer, "sources": sources }))
                    .unwrap_or_default()
            }
            SearchResponse::RawText(text) => text.clone(),
        }
    }
}

/// One entry of a structured results collection. Missing attributes are empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "content")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl SearchResult {
    fn into_record(self) -> SourceRecord {
        SourceRecord::new(self.title.unwrap_or_default(), self.url.unwrap_or_default())
            .with_snippet(self.snippet.unwrap_or_default())
            .with_publication_date(self.date.unwrap_or_default())
    }
}

/// Result of extracting one response. `Failed` is distinct from finding nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Sources(Vec<SourceRecord>),
    Failed(String),
}

impl ExtractionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractionOutcome::Failed(_))
    }

    /// Sources found, with a failure collapsed to none.
    pub fn into_sources(self) -> Vec<SourceRecord> {
        match self {
            ExtractionOutcome::Sources(sources) => sources,
            ExtractionOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Extract source records from a search response. Never panics or errors;
/// malformed structured results produce `ExtractionOutcome::Failed`.
pub fn extract_sources(response: &SearchResponse, max_raw_urls: usize) -> ExtractionOutcome {
    let outcome = match response {
        SearchResponse::Structured { results } => extract_structured(results),
        SearchResponse::SourcedAnswer { sources, .. } => extract_structured(sources),
        SearchResponse::RawText(text) => ExtractionOutcome::Sources(extract_raw_urls(text, max_raw_urls)),
    };

    match &outcome {
        ExtractionOutcome::Sources(sources) => debug!(count = sources.len(), "Extracted sources"),
        ExtractionOutcome::Failed(reason) => warn!(reason = %reason, "Source extraction failed"),
    }
    outcome
}

fn extract_structured(results: &[serde_json::Value]) -> ExtractionOutcome {
    let mut sources = Vec::with_capacity(results.len());
    for (i, value) in results.iter().enumerate() {
        if !value.is_object() {
            return ExtractionOutcome::Failed(format!("result {} is not an object", i));
        }
        match SearchResult::deserialize(value) {
            Ok(result) => sources.push(result.into_record()),
            Err(e) => return ExtractionOutcome::Failed(format!("result {}: {}", i, e)),
        }
    }
    ExtractionOutcome::Sources(sources)
}

fn extract_raw_urls(text: &str, max: usize) -> Vec<SourceRecord> {
    URL_PATTERN
        .find_iter(text)
        .take(max)
        .map(|m| {
            let url = m.as_str();
            let title = format!("Source from {}", extract_domain(url));
            SourceRecord::new(title, url).with_source_type(classify(url, ""))
        })
        .collect()
}
