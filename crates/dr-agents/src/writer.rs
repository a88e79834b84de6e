//! Writer agent: turns research notes into a cited report.

use dr_research::SourceRecord;

use crate::InternalAgent;

const SYSTEM_PROMPT: &str = r#"You are a Research Writer with Citation Expertise.

## Your Mission
Create comprehensive research reports with proper citations, links and source attribution.

## What You Excel At
- Creating well-structured research reports
- Properly citing academic papers and sources
- Formatting citations and references
- Organizing information with clear source attribution
- Maintaining academic integrity and proper referencing standards

## Citation Rules (CRITICAL)
You are given a numbered list of the sources discovered during research. Cite them in the text as [n] using exactly those numbers. Never invent a source number that is not in the list, and never renumber sources."#;

pub struct WriterAgent {
    max_turns: usize,
}

impl WriterAgent {
    pub fn new() -> Self {
        Self { max_turns: 3 }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl Default for WriterAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl InternalAgent for WriterAgent {
    fn name(&self) -> &str {
        "writer"
    }

    fn description(&self) -> &str {
        "Research Writer with Citation Expertise: synthesizes findings into a structured, cited report"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn tool_names(&self) -> &[&str] {
        &[]
    }

    fn max_turns(&self) -> usize {
        self.max_turns
    }
}

/// The numbered source list handed to the writer. Numbers match the reference list.
fn numbered_sources(sources: &[SourceRecord]) -> String {
    if sources.is_empty() {
        return "(no sources were recorded; do not use numbered citations)\n".to_string();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut line = format!("[{}] {} - {} ({})", i + 1, s.title, s.url, s.source_type);
            if !s.publication_date.is_empty() {
                line.push_str(&format!(", {}", s.publication_date));
            }
            line.push('\n');
            line
        })
        .collect()
}

/// Task prompt for the writing stage.
pub fn writing_task(query: &str, findings: &str, sources: &[SourceRecord]) -> String {
    format!(
        r#"Create a comprehensive research report about: {query}

## Research Findings
{findings}

## Sources
{sources}
Requirements:
- Target length: 2000-2500 words
- Include proper citations and source links throughout
- Structure with clear sections and subsections
- Add a comprehensive References section at the end

Report Structure:
1. Executive Summary (200-250 words)
2. Introduction and Background (400-500 words)
3. Literature Review (if academic sources available) (300-400 words)
4. Key Findings and Analysis (600-800 words)
5. Recent Developments and News (300-400 words)
6. Technical Considerations (if applicable) (200-300 words)
7. Conclusion and Future Implications (200-300 words)
8. References and Sources (comprehensive list)

Citation Guidelines:
- Use in-text citations like [1], [2], numbered as in the Sources list above
- Include direct links to sources where possible
- Separate academic sources from news/web sources
- Include DOIs for academic papers when available
- Format: Author(s), Title, Journal/Source, Date, URL
- Prioritize recent and authoritative sources
- Include publication dates and access dates

Content Guidelines:
- Synthesize information from multiple sources
- Highlight conflicting viewpoints when present
- Include specific data, statistics and examples
- Reference expert opinions and quotes
- Maintain academic tone while being accessible
- Ensure all claims are properly supported by citations"#,
        query = query,
        findings = findings,
        sources = numbered_sources(sources),
    )
}
