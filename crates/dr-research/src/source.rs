use serde::{Deserialize, Serialize};

const ACADEMIC_DOMAINS: &[&str] = &[
    "arxiv.org",
    "pubmed.ncbi.nlm.nih.gov",
    "scholar.google.com",
    "researchgate.net",
    "ieee.org",
    "acm.org",
    "springer.com",
    "sciencedirect.com",
    "nature.com",
    "science.org",
    "cell.com",
    "plos.org",
    "biorxiv.org",
    "medrxiv.org",
    ".edu/",
    "jstor.org",
];

const NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bbc.com",
    "cnn.com",
    "nytimes.com",
    "wsj.com",
    "theguardian.com",
    "washingtonpost.com",
    "bloomberg.com",
    "forbes.com",
    "techcrunch.com",
    "wired.com",
    "news.",
];

const TECH_DOMAINS: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "medium.com",
    "dev.to",
    "hackernews.com",
    "techcrunch.com",
    "arstechnica.com",
];

const ACADEMIC_TITLE_KEYWORDS: &[&str] = &["research", "study", "paper", "journal", "analysis", "review"];

/// Provenance category of a discovered source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Web,
    Academic,
    News,
    Technical,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::Academic => "academic",
            SourceType::News => "news",
            SourceType::Technical => "technical",
        }
    }

    /// Title-cased name used in report headings.
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Web => "Web",
            SourceType::Academic => "Academic",
            SourceType::News => "News",
            SourceType::Technical => "Technical",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered reference. Empty strings and empty author lists mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub domain: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub journal: String,
}

impl SourceRecord {
    /// Build a record from a title and URL. Domain and type are derived.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        let url = url.into();
        Self {
            domain: extract_domain(&url),
            source_type: classify(&url, &title),
            title,
            url,
            ..Default::default()
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_publication_date(mut self, date: impl Into<String>) -> Self {
        self.publication_date = date.into();
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = doi.into();
        self
    }

    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = journal.into();
        self
    }
}

/// Classify a source by URL and title. First match wins:
/// academic domains, news domains, technical domains, academic title keywords, web.
pub fn classify(url: &str, title: &str) -> SourceType {
    let url = url.to_lowercase();
    let title = title.to_lowercase();

    let url_matches = |list: &[&str]| list.iter().any(|indicator| url.contains(indicator));

    if url_matches(ACADEMIC_DOMAINS) {
        SourceType::Academic
    } else if url_matches(NEWS_DOMAINS) {
        SourceType::News
    } else if url_matches(TECH_DOMAINS) {
        SourceType::Technical
    } else if ACADEMIC_TITLE_KEYWORDS.iter().any(|kw| title.contains(kw)) {
        SourceType::Academic
    } else {
        SourceType::Web
    }
}

/// Host part of a URL. Unparseable or hostless input falls back to the
/// third `/`-separated segment, or the raw string when there is none.
pub fn extract_domain(raw: &str) -> String {
    if let Some(host) = url::Url::parse(raw).ok().as_ref().and_then(|u| u.host_str()) {
        return host.to_string();
    }
    if raw.contains('/') {
        if let Some(segment) = raw.split('/').nth(2) {
            return segment.to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("HTTPS://ARXIV.ORG/abs/1", ""), SourceType::Academic);
        assert_eq!(classify("https://arxiv.org/abs/1", ""), SourceType::Academic);
    }

    #[test]
    fn test_classify_priority() {
        // .edu beats github
        assert_eq!(
            classify("https://cs.stanford.edu/~lab/github.com/mirror", ""),
            SourceType::Academic
        );
        // techcrunch is on both the news and tech lists
        assert_eq!(classify("https://techcrunch.com/2024/ai", ""), SourceType::News);
        assert_eq!(classify("https://github.com/rust-lang/rust", "Research notes"), SourceType::Technical);
        assert_eq!(classify("https://news.ycombinator.com/item", ""), SourceType::News);
    }

    #[test]
    fn test_classify_title_keywords() {
        assert_eq!(classify("https://example.com/a", "A Systematic Review"), SourceType::Academic);
        assert_eq!(classify("https://example.com/a", "Cooking tips"), SourceType::Web);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.nature.com/articles/x"), "www.nature.com");
        assert_eq!(extract_domain("http://localhost:8080/path"), "localhost");
        assert_eq!(extract_domain("htp//broken/thing"), "broken");
        assert_eq!(extract_domain("not a url"), "not a url");
        assert_eq!(extract_domain("a/b"), "a/b");
    }

    #[test]
    fn test_source_record_new_derives_fields() {
        let record = SourceRecord::new("Attention Is All You Need", "https://arxiv.org/abs/1706.03762")
            .with_authors(vec!["Vaswani".into()])
            .with_publication_date("2017");
        assert_eq!(record.domain, "arxiv.org");
        assert_eq!(record.source_type, SourceType::Academic);
        assert!(record.doi.is_empty());
    }

    #[test]
    fn test_source_type_serde() {
        let json = serde_json::to_string(&SourceType::Technical).unwrap();
        assert_eq!(json, "\"technical\"");
        assert_eq!(SourceType::default(), SourceType::Web);
        assert_eq!(SourceType::News.label(), "News");
    }
}
