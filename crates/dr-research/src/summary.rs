use crate::source::{SourceRecord, SourceType};

const MAX_PER_TYPE: usize = 10;

/// Group sources by type, types in order of first appearance.
pub fn group_by_type(sources: &[SourceRecord]) -> Vec<(SourceType, Vec<&SourceRecord>)> {
    let mut groups: Vec<(SourceType, Vec<&SourceRecord>)> = Vec::new();
    for source in sources {
        match groups.iter_mut().find(|(t, _)| *t == source.source_type) {
            Some((_, members)) => members.push(source),
            None => groups.push((source.source_type, vec![source])),
        }
    }
    groups
}

/// The "Source Summary" section appended to a finished report.
/// Returns an empty string when there are no sources.
pub fn source_summary(sources: &[SourceRecord]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n\n---\n\n## Source Summary\n\n");
    for (source_type, members) in group_by_type(sources) {
        out.push_str(&format!("\n### {} Sources ({})\n\n", source_type.label(), members.len()));
        for (i, source) in members.iter().take(MAX_PER_TYPE).enumerate() {
            out.push_str(&format!("{}. **{}**\n", i + 1, source.title));
            out.push_str(&format!("   - URL: {}\n", source.url));
            out.push_str(&format!("   - Domain: {}\n", source.domain));
            if !source.publication_date.is_empty() {
                out.push_str(&format!("   - Date: {}\n", source.publication_date));
            }
            out.push('\n');
        }
    }
    out
}
