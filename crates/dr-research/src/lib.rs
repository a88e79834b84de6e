//! dr-research: source tracking for deep-researcher
//!
//! Every search result the researcher sees is turned into a [`SourceRecord`],
//! classified by provenance and kept in the per-call [`ResearchSession`].
//! The same records feed the citation formatter, the statistics report,
//! the grouped source summary and the exports.

pub mod citation;
pub mod export;
pub mod extract;
pub mod session;
pub mod source;
pub mod stats;
pub mod summary;

pub use citation::{cited_indices, dangling_citations, format_citations, format_reference, CitationStyle};
pub use export::{
    estimate_word_count, export_filename, render, strip_markdown, write_export, ExportFormat, ExportedSource,
    ReportExport,
};
pub use extract::{extract_sources, ExtractionOutcome, SearchResponse, SearchResult, DEFAULT_MAX_RAW_URLS};
pub use session::{lock_session, new_handle, ResearchSession, SessionHandle, DEFAULT_MAX_SEARCHES};
pub use source::{classify, extract_domain, SourceRecord, SourceType};
pub use stats::{CountEntry, SourceStatistics};
pub use summary::{group_by_type, source_summary};
