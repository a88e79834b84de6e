//! dr-tools: search tools for deep-researcher
//!
//! [`LinkupClient`] talks to the Linkup search API; [`SearchTool`] wraps any
//! [`SearchClient`] as the researcher's `linkup_search` tool, enforcing the
//! per-session quota and recording every discovered source.

pub mod linkup;
pub mod search;

pub use linkup::{
    LinkupClient, OutputType, SearchClient, SearchDepth, SearchFocus, SearchRequest, DEFAULT_LINKUP_URL,
};
pub use search::{SearchTool, SearchToolConfig, SEARCH_TOOL_NAME};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
