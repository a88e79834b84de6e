//! Reference list rendering and in-text citation checks.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::SourceRecord;

static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Plain,
}

impl CitationStyle {
    /// Case-insensitive; anything other than "apa" or "mla" is `Plain`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "apa" => CitationStyle::Apa,
            "mla" => CitationStyle::Mla,
            _ => CitationStyle::Plain,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Plain => "plain",
        }
    }
}

impl FromStr for CitationStyle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl std::fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render one reference entry. `index` is 1-based.
pub fn format_reference(index: usize, source: &SourceRecord, style: CitationStyle) -> String {
    let mut citation = format!("[{}] ", index);

    match style {
        CitationStyle::Apa => {
            if !source.authors.is_empty() {
                citation.push_str(&source.authors.join(", "));
                citation.push(' ');
            }
            if !source.publication_date.is_empty() {
                citation.push_str(&format!("({}). ", source.publication_date));
            }
            citation.push_str(&format!("*{}*. ", source.title));
            if !source.journal.is_empty() {
                citation.push_str(&format!("{}. ", source.journal));
            }
            if source.doi.is_empty() {
                citation.push_str(&source.url);
            } else {
                citation.push_str(&format!("https://doi.org/{}", source.doi));
            }
        }
        CitationStyle::Mla => {
            if let Some(first) = source.authors.first() {
                citation.push_str(&format!("{}. ", first));
            }
            citation.push_str(&format!("\"{}.\" ", source.title));
            if !source.journal.is_empty() {
                citation.push_str(&format!("*{}*, ", source.journal));
            }
            if !source.publication_date.is_empty() {
                citation.push_str(&format!("{}. ", source.publication_date));
            }
            citation.push_str(&format!("Web. {}", source.url));
        }
        CitationStyle::Plain => {
            citation.push_str(&format!("{}. {}", source.title, source.url));
            if !source.publication_date.is_empty() {
                citation.push_str(&format!(" (Accessed: {})", source.publication_date));
            }
        }
    }

    citation
}

/// Append a references section to `content`, numbered in discovery order.
pub fn format_citations(content: &str, sources: &[SourceRecord], style: CitationStyle) -> String {
    if sources.is_empty() {
        return format!("{}\n\n*No sources available for citation formatting.*", content);
    }

    let mut formatted = format!("{}\n\n---\n\n## References\n\n", content);
    for (i, source) in sources.iter().enumerate() {
        formatted.push_str(&format_reference(i + 1, source, style));
        formatted.push_str("\n\n");
    }
    formatted
}

/// Citation numbers `[n]` used in the body text.
pub fn cited_indices(content: &str) -> BTreeSet<usize> {
    CITATION_PATTERN
        .captures_iter(content)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}

/// Cited numbers that have no matching reference entry.
pub fn dangling_citations(content: &str, source_count: usize) -> Vec<usize> {
    cited_indices(content)
        .into_iter()
        .filter(|&n| n == 0 || n > source_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper() -> SourceRecord {
        SourceRecord::new("Deep Learning", "https://www.nature.com/articles/nature14539")
            .with_authors(vec!["LeCun, Y.".into(), "Bengio, Y.".into()])
            .with_publication_date("2015")
            .with_journal("Nature")
            .with_doi("10.1038/nature14539")
    }

    fn bare() -> SourceRecord {
        SourceRecord::new("Tokio", "https://tokio.rs")
    }

    #[test]
    fn test_style_parse() {
        assert_eq!(CitationStyle::parse("APA"), CitationStyle::Apa);
        assert_eq!(CitationStyle::parse("mla"), CitationStyle::Mla);
        assert_eq!(CitationStyle::parse("chicago"), CitationStyle::Plain);
        assert_eq!("Mla".parse::<CitationStyle>().unwrap(), CitationStyle::Mla);
    }

    #[test]
    fn test_apa() {
        assert_eq!(
            format_reference(1, &paper(), CitationStyle::Apa),
            "[1] LeCun, Y., Bengio, Y. (2015). *Deep Learning*. Nature. https://doi.org/10.1038/nature14539"
        );
        assert_eq!(format_reference(2, &bare(), CitationStyle::Apa), "[2] *Tokio*. https://tokio.rs");
    }

    #[test]
    fn test_mla() {
        assert_eq!(
            format_reference(1, &paper(), CitationStyle::Mla),
            "[1] LeCun, Y.. \"Deep Learning.\" *Nature*, 2015. Web. https://www.nature.com/articles/nature14539"
        );
        assert_eq!(
            format_reference(3, &bare(), CitationStyle::Mla),
            "[3] \"Tokio.\" Web. https://tokio.rs"
        );
    }

    #[test]
    fn test_plain() {
        assert_eq!(
            format_reference(1, &paper(), CitationStyle::Plain),
            "[1] Deep Learning. https://www.nature.com/articles/nature14539 (Accessed: 2015)"
        );
        assert_eq!(format_reference(1, &bare(), CitationStyle::Plain), "[1] Tokio. https://tokio.rs");
    }

    #[test]
    fn test_format_citations_empty_sources() {
        let out = format_citations("Body", &[], CitationStyle::Apa);
        assert_eq!(out, "Body\n\n*No sources available for citation formatting.*");
        assert!(!out.contains("## References"));
    }

    #[test]
    fn test_format_citations_numbering() {
        let out = format_citations("Body [1] [2]", &[paper(), bare()], CitationStyle::Plain);
        assert!(out.starts_with("Body [1] [2]\n\n---\n\n## References\n\n[1] Deep Learning."));
        assert!(out.contains("\n\n[2] Tokio. https://tokio.rs\n\n"));
    }

    #[test]
    fn test_cited_and_dangling() {
        let content = "Claim [1]. Another [3][1]. Bogus [0]. Not a cite [x].";
        assert_eq!(cited_indices(content).into_iter().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(dangling_citations(content, 2), vec![0, 3]);
        assert!(dangling_citations("No citations here", 0).is_empty());
    }
}
