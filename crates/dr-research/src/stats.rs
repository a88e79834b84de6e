use serde::{Deserialize, Serialize};

use crate::source::SourceRecord;

const TOP_DOMAINS: usize = 10;

/// A counted category (source type or domain) and its share of all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub name: String,
    pub count: usize,
    pub percentage: f64,
}

/// Aggregate view over one session's sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatistics {
    pub total: usize,
    pub by_type: Vec<CountEntry>,
    pub by_domain: Vec<CountEntry>,
    pub with_dates: usize,
    pub with_authors: usize,
    pub with_doi: usize,
}

impl SourceStatistics {
    pub fn compute(sources: &[SourceRecord]) -> Self {
        let total = sources.len();
        Self {
            total,
            by_type: count_by(sources, |s| s.source_type.label().to_string()),
            by_domain: count_by(sources, |s| s.domain.clone()),
            with_dates: sources.iter().filter(|s| !s.publication_date.is_empty()).count(),
            with_authors: sources.iter().filter(|s| !s.authors.is_empty()).count(),
            with_doi: sources.iter().filter(|s| !s.doi.is_empty()).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn type_count(&self, label: &str) -> usize {
        self.by_type
            .iter()
            .find(|e| e.name == label)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    pub fn render_markdown(&self) -> String {
        if self.is_empty() {
            return "No sources available for analysis.".to_string();
        }

        let mut out = String::from("# Source Statistics\n\n## Overview\n");
        out.push_str(&format!("- **Total Sources**: {}\n", self.total));
        out.push_str(&format!(
            "- **Sources with Publication Dates**: {} ({:.1}%)\n",
            self.with_dates,
            percent(self.with_dates, self.total)
        ));
        out.push_str(&format!(
            "- **Sources with Author Information**: {} ({:.1}%)\n",
            self.with_authors,
            percent(self.with_authors, self.total)
        ));
        out.push_str(&format!(
            "- **Sources with DOI**: {} ({:.1}%)\n",
            self.with_doi,
            percent(self.with_doi, self.total)
        ));

        out.push_str("\n## Source Types\n");
        for entry in &self.by_type {
            out.push_str(&format!("- **{}**: {} ({:.1}%)\n", entry.name, entry.count, entry.percentage));
        }

        out.push_str("\n## Top Domains\n");
        for entry in self.by_domain.iter().take(TOP_DOMAINS) {
            out.push_str(&format!("- **{}**: {} ({:.1}%)\n", entry.name, entry.count, entry.percentage));
        }

        out
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Count by key, most frequent first. Ties keep first-appearance order.
fn count_by<F>(sources: &[SourceRecord], key: F) -> Vec<CountEntry>
where
    F: Fn(&SourceRecord) -> String,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    for source in sources {
        let k = key(source);
        match counts.iter_mut().find(|(name, _)| *name == k) {
            Some((_, count)) => *count += 1,
            None => counts.push((k, 1)),
        }
    }
    // stable sort
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = sources.len();
    counts
        .into_iter()
        .map(|(name, count)| CountEntry {
            name,
            count,
            percentage: percent(count, total),
        })
        .collect()
}
