//! Researcher agent: runs the strategic searches and reports findings.

use crate::InternalAgent;

const SYSTEM_PROMPT: &str = r#"You are an Advanced Research Specialist.

## Your Mission
Conduct comprehensive research across multiple source types, including academic papers, news articles and technical documentation.

## What You Excel At
- Identifying high-quality academic sources and research papers
- Finding recent news articles and industry reports
- Locating technical documentation and implementation guides
- Conducting systematic searches across different domains
- Tracking and organizing source information for citations

## Your Tools
- `linkup_search`: web search with source tracking. Set `focus` to `general`, `academic`, `news` or `technical`; the query is tuned for that focus automatically.

The number of searches per session is limited. When the tool reports that the search limit has been reached, stop searching and work with the results you already have.

## Output Expectations
Report your findings as structured notes: key facts, data and viewpoints, each tied to the URL it came from, with publication dates, authors, DOIs and journal names whenever the results show them."#;

const FINAL_FINDINGS_PROMPT: &str = "You have used all of your research turns. Do not search again. \
Report your findings now from the results you already have, as structured notes tied to their URLs.";

/// Focus for each of the planned searches, in order.
pub const SEARCH_PLAN: [(&str, &str); 8] = [
    ("General overview", "general"),
    ("Academic research and papers", "academic"),
    ("Recent news and developments", "news"),
    ("Technical documentation", "technical"),
    ("Statistical data and reports", "general"),
    ("Expert opinions and analysis", "general"),
    ("Case studies and examples", "academic"),
    ("Industry perspectives", "technical"),
];

pub struct ResearcherAgent {
    max_turns: usize,
}

impl ResearcherAgent {
    pub fn new() -> Self {
        Self { max_turns: 12 }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl Default for ResearcherAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl InternalAgent for ResearcherAgent {
    fn name(&self) -> &str {
        "researcher"
    }

    fn description(&self) -> &str {
        "Advanced Research Specialist: runs focused searches across general, academic, news and technical sources"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn tool_names(&self) -> &[&str] {
        &["linkup_search"]
    }

    fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn final_answer_prompt(&self) -> Option<&str> {
        Some(FINAL_FINDINGS_PROMPT)
    }
}

/// Task prompt for the research stage.
pub fn research_task(query: &str) -> String {
    let plan: String = SEARCH_PLAN
        .iter()
        .enumerate()
        .map(|(i, (topic, focus))| format!("{}. {} (focus: {})\n", i + 1, topic, focus))
        .collect();

    format!(
        r#"Conduct comprehensive research on: {query}

Execute {count} strategic searches with different focus areas:
{plan}
For each search:
- Use targeted queries for the specific focus area
- Prioritize high-quality, authoritative sources
- Look for research papers, academic articles and peer-reviewed content
- Collect recent news articles and industry reports
- Gather technical documentation and implementation guides
- Note publication dates, authors and source credibility
- Extract DOIs, journal names and publication details when available

Pay special attention to:
- ArXiv preprints and research papers
- PubMed medical research
- IEEE and ACM publications
- University research publications
- Government and institutional reports
- Industry whitepapers and technical documentation"#,
        query = query,
        count = SEARCH_PLAN.len(),
        plan = plan,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_researcher_agent() {
        let agent = ResearcherAgent::new();
        assert_eq!(agent.name(), "researcher");
        assert!(agent.system_prompt().contains("Advanced Research Specialist"));
        assert_eq!(agent.tool_names(), &["linkup_search"]);
        let config = agent.with_max_turns(4).agent_config();
        assert_eq!(config.max_iterations, 4);
        assert!(config
            .final_answer_prompt
            .as_deref()
            .is_some_and(|p| p.contains("Report your findings now")));
    }

    #[test]
    fn test_research_task_lists_plan() {
        let task = research_task("quantum error correction");
        assert!(task.starts_with("Conduct comprehensive research on: quantum error correction"));
        assert!(task.contains("Execute 8 strategic searches"));
        assert!(task.contains("2. Academic research and papers (focus: academic)\n"));
        assert!(task.contains("8. Industry perspectives (focus: technical)\n"));
    }
}
