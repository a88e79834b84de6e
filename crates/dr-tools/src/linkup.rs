//! Linkup search API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use dr_core::Error;
use dr_research::SearchResponse;

pub const DEFAULT_LINKUP_URL: &str = "https://api.linkup.so/v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Standard,
    Deep,
}

impl SearchDepth {
    /// Unknown values fall back to `Standard`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("deep") {
            SearchDepth::Deep
        } else {
            SearchDepth::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Standard => "standard",
            SearchDepth::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    #[default]
    SearchResults,
    SourcedAnswer,
    Structured,
}

impl OutputType {
    pub fn parse(s: &str) -> Self {
        match s {
            "sourcedAnswer" => OutputType::SourcedAnswer,
            "structured" => OutputType::Structured,
            _ => OutputType::SearchResults,
        }
    }
}

/// Search intent, used to bias the query and the depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchFocus {
    #[default]
    General,
    Academic,
    News,
    Technical,
}

impl SearchFocus {
    /// Unknown values fall back to `General`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "academic" => SearchFocus::Academic,
            "news" => SearchFocus::News,
            "technical" => SearchFocus::Technical,
            _ => SearchFocus::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFocus::General => "general",
            SearchFocus::Academic => "academic",
            SearchFocus::News => "news",
            SearchFocus::Technical => "technical",
        }
    }

    /// Append the focus-specific site and keyword hints to a query.
    pub fn enhance_query(&self, query: &str) -> String {
        match self {
            SearchFocus::Academic => format!(
                "{} site:arxiv.org OR site:pubmed.ncbi.nlm.nih.gov OR site:scholar.google.com OR \"research paper\" OR \"study\"",
                query
            ),
            SearchFocus::News => format!(
                "{} site:reuters.com OR site:bbc.com OR site:nytimes.com OR \"news\" OR \"latest\"",
                query
            ),
            SearchFocus::Technical => format!(
                "{} site:github.com OR site:stackoverflow.com OR \"technical\" OR \"implementation\"",
                query
            ),
            SearchFocus::General => query.to_string(),
        }
    }

    /// Academic and technical searches, and any query mentioning research, go deep.
    pub fn resolve_depth(&self, query: &str, requested: SearchDepth) -> SearchDepth {
        if matches!(self, SearchFocus::Academic | SearchFocus::Technical)
            || query.to_lowercase().contains("research")
        {
            SearchDepth::Deep
        } else {
            requested
        }
    }
}

/// A request as sent to the search service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "q")]
    pub query: String,
    pub depth: SearchDepth,
    #[serde(rename = "outputType")]
    pub output_type: OutputType,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: SearchDepth::default(),
            output_type: OutputType::default(),
        }
    }

    pub fn with_depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }
}

/// The web-search service.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, Error>;
}

pub struct LinkupClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LinkupClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(api_key, Duration::from_secs(60))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("LINKUP_API_KEY not set"));
        }
        let client = Client::builder()
            .user_agent(concat!("deep-researcher/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_LINKUP_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn status_error(status: u16, body: String) -> Error {
    match status {
        401 | 403 => Error::auth(body),
        429 => Error::rate_limit(body),
        _ => Error::api(status, body),
    }
}

#[async_trait]
impl SearchClient for LinkupClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        debug!(
            query = %request.query,
            depth = request.depth.as_str(),
            output_type = ?request.output_type,
            "Linkup search"
        );

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Linkup search failed");
            return Err(status_error(status.as_u16(), body));
        }

        debug!(bytes = body.len(), "Linkup response");
        Ok(SearchResponse::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_query() {
        assert_eq!(SearchFocus::General.enhance_query("rust async"), "rust async");
        assert_eq!(
            SearchFocus::Academic.enhance_query("rust async"),
            "rust async site:arxiv.org OR site:pubmed.ncbi.nlm.nih.gov OR site:scholar.google.com OR \"research paper\" OR \"study\""
        );
        assert_eq!(
            SearchFocus::News.enhance_query("q"),
            "q site:reuters.com OR site:bbc.com OR site:nytimes.com OR \"news\" OR \"latest\""
        );
        assert_eq!(
            SearchFocus::Technical.enhance_query("q"),
            "q site:github.com OR site:stackoverflow.com OR \"technical\" OR \"implementation\""
        );
    }

    #[test]
    fn test_resolve_depth() {
        let standard = SearchDepth::Standard;
        assert_eq!(SearchFocus::Academic.resolve_depth("q", standard), SearchDepth::Deep);
        assert_eq!(SearchFocus::Technical.resolve_depth("q", standard), SearchDepth::Deep);
        assert_eq!(SearchFocus::News.resolve_depth("q", standard), SearchDepth::Standard);
        assert_eq!(SearchFocus::General.resolve_depth("Latest RESEARCH on q", standard), SearchDepth::Deep);
        assert_eq!(SearchFocus::General.resolve_depth("q", SearchDepth::Deep), SearchDepth::Deep);
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(SearchFocus::parse("Academic"), SearchFocus::Academic);
        assert_eq!(SearchFocus::parse("sports"), SearchFocus::General);
        assert_eq!(SearchDepth::parse("DEEP"), SearchDepth::Deep);
        assert_eq!(SearchDepth::parse("shallow"), SearchDepth::Standard);
        assert_eq!(OutputType::parse("sourcedAnswer"), OutputType::SourcedAnswer);
    }

    #[test]
    fn test_request_body() {
        let request = SearchRequest::new("rust")
            .with_depth(SearchDepth::Deep)
            .with_output_type(OutputType::SourcedAnswer);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"q": "rust", "depth": "deep", "outputType": "sourcedAnswer"}));
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(401, "bad key".into()).is_auth_error());
        assert!(status_error(429, "slow down".into()).is_rate_limited());
        assert!(matches!(status_error(500, "boom".into()), Error::Api { status: 500, .. }));
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(LinkupClient::new(""), Err(Error::Config(_))));
    }
}
