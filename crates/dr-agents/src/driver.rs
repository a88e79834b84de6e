//! Session driver: one fresh session per attempt, retries, source summary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use dr_core::Error;
use dr_research::{dangling_citations, lock_session, new_handle, source_summary, SourceRecord, DEFAULT_MAX_SEARCHES};

use crate::pipeline::ResearchPipeline;

const RATE_LIMITED_MESSAGE: &str =
    "API Rate Limited: Please try again later. Consider breaking your query into smaller parts.";

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_searches: u32,
    pub max_attempts: u32,
    /// Base backoff; attempt `n` waits `retry_delay * n` before the next one.
    pub retry_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_searches: DEFAULT_MAX_SEARCHES,
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    RateLimited,
    Failed,
}

/// Outcome of one research request. `content` is always displayable text.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub query: String,
    pub content: String,
    pub sources: Vec<SourceRecord>,
    pub searches_used: u32,
    pub status: ReportStatus,
    pub generated_at: DateTime<Utc>,
}

impl ResearchReport {
    pub fn is_completed(&self) -> bool {
        self.status == ReportStatus::Completed
    }
}

pub struct ResearchDriver {
    pipeline: Arc<dyn ResearchPipeline>,
    config: DriverConfig,
}

impl ResearchDriver {
    pub fn new(pipeline: Arc<dyn ResearchPipeline>) -> Self {
        Self {
            pipeline,
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run research to completion. Failures end up in the report text, never as an error.
    pub async fn research(&self, query: &str) -> ResearchReport {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let session = new_handle(self.config.max_searches);
            info!(query = %query, attempt, max_attempts, "Research attempt starting");

            let result = self.pipeline.run(query, &session).await;
            let (sources, searches_used) = {
                let session = lock_session(&session);
                (session.all().to_vec(), session.search_count())
            };

            let err = match result {
                Ok(body) => {
                    let dangling = dangling_citations(&body, sources.len());
                    if !dangling.is_empty() {
                        warn!(?dangling, sources = sources.len(), "Report cites sources that were not recorded");
                    }
                    info!(searches_used, sources = sources.len(), "Research complete");
                    let content = format!("{}{}", body, source_summary(&sources));
                    return self.report(query, content, sources, searches_used, ReportStatus::Completed);
                }
                Err(e) => e,
            };

            let rate_limited = err.is_rate_limited();
            if err.is_fatal() || attempt >= max_attempts {
                error!(error = %err, attempt, rate_limited, "Research failed");
                let (content, status) = if rate_limited {
                    (RATE_LIMITED_MESSAGE.to_string(), ReportStatus::RateLimited)
                } else {
                    (failure_message(&err), ReportStatus::Failed)
                };
                return self.report(query, content, sources, searches_used, status);
            }

            let delay = self.config.retry_delay * attempt;
            if rate_limited {
                warn!(error = %err, attempt, delay_secs = delay.as_secs(), "Rate limit encountered, backing off");
            } else {
                warn!(error = %err, attempt, delay_secs = delay.as_secs(), "Research attempt failed, retrying");
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Report text only.
    pub async fn run_research(&self, query: &str) -> String {
        self.research(query).await.content
    }

    fn report(
        &self,
        query: &str,
        content: String,
        sources: Vec<SourceRecord>,
        searches_used: u32,
        status: ReportStatus,
    ) -> ResearchReport {
        ResearchReport {
            query: query.to_string(),
            content,
            sources,
            searches_used,
            status,
            generated_at: Utc::now(),
        }
    }
}

fn failure_message(err: &Error) -> String {
    format!(
        "Research Error: {}\n\nTips:\n1. Simplify your query\n2. Check API configurations\n3. Try again later",
        err
    )
}
