//! Test utilities for code that searches.
//! Only compiled when running tests or with the `testing` feature.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use dr_core::Error;
use dr_research::SearchResponse;

use crate::linkup::{SearchClient, SearchRequest};

/// A search client that replays queued responses and records requests.
pub struct ScriptedSearchClient {
    responses: Mutex<VecDeque<Result<SearchResponse, Error>>>,
    /// Body returned once the queue is empty. Without one, an empty queue is an error.
    fallback: Option<String>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearchClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            captured_requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same body.
    pub fn repeating(body: &str) -> Self {
        Self {
            fallback: Some(body.to_string()),
            ..Self::new()
        }
    }

    pub fn queue_body(&self, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(SearchResponse::from_body(body)));
    }

    pub fn queue_error(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for ScriptedSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, Error> {
        self.captured_requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(body) => Ok(SearchResponse::from_body(body)),
            None => Err(Error::Unknown("ScriptedSearchClient: no responses queued".into())),
        }
    }
}
