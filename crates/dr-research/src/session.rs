//! Per-call research session: the search counter and discovered sources.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::source::SourceRecord;

pub const DEFAULT_MAX_SEARCHES: u32 = 8;

/// Session state shared between the search tool and the driver for one research call.
pub type SessionHandle = Arc<Mutex<ResearchSession>>;

#[derive(Debug, Clone)]
pub struct ResearchSession {
    search_count: u32,
    max_searches: u32,
    sources: Vec<SourceRecord>,
}

impl Default for ResearchSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEARCHES)
    }
}

impl ResearchSession {
    pub fn new(max_searches: u32) -> Self {
        Self {
            search_count: 0,
            max_searches,
            sources: Vec::new(),
        }
    }

    /// Clear the counter and the source list. The quota is kept.
    pub fn reset(&mut self) {
        self.search_count = 0;
        self.sources.clear();
    }

    /// Count one completed search and return the new count.
    pub fn increment(&mut self) -> u32 {
        self.search_count += 1;
        self.search_count
    }

    pub fn add(&mut self, source: SourceRecord) {
        self.sources.push(source);
    }

    pub fn extend(&mut self, sources: impl IntoIterator<Item = SourceRecord>) {
        self.sources.extend(sources);
    }

    /// Sources in discovery order. Duplicates are kept.
    pub fn all(&self) -> &[SourceRecord] {
        &self.sources
    }

    pub fn search_count(&self) -> u32 {
        self.search_count
    }

    pub fn max_searches(&self) -> u32 {
        self.max_searches
    }

    pub fn quota_reached(&self) -> bool {
        self.search_count >= self.max_searches
    }

    pub fn remaining(&self) -> u32 {
        self.max_searches.saturating_sub(self.search_count)
    }
}

pub fn new_handle(max_searches: u32) -> SessionHandle {
    Arc::new(Mutex::new(ResearchSession::new(max_searches)))
}

/// Lock a session, recovering the data if a previous holder panicked.
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, ResearchSession> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}
