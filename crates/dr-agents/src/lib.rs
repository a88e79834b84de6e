//! Research agents for deep-researcher.
//!
//! This crate provides:
//! - `InternalAgent` trait for defining agent behavior
//! - The researcher and writer agents
//! - `ResearchPipeline`, the two-stage research-then-write run
//! - `ResearchDriver`, which owns a session per call and retries failed runs

mod driver;
mod pipeline;
mod researcher;
mod writer;

pub use driver::{DriverConfig, ReportStatus, ResearchDriver, ResearchReport};
pub use pipeline::{AgentPipeline, PipelineSettings, ResearchPipeline};
pub use researcher::{research_task, ResearcherAgent};
pub use writer::{writing_task, WriterAgent};

use dr_core::AgentConfig;

/// Trait for internal agents.
///
/// Each agent has a role-defining system prompt and a set of tools it can use.
pub trait InternalAgent: Send + Sync {
    /// Get the agent name (e.g., "researcher", "writer")
    fn name(&self) -> &str;

    /// Get the agent description for display
    fn description(&self) -> &str;

    /// Get the system prompt for this agent
    fn system_prompt(&self) -> &str;

    /// Get the tool names this agent needs
    fn tool_names(&self) -> &[&str];

    /// Get the default max iterations for the agentic loop
    fn max_turns(&self) -> usize {
        20
    }

    /// Request sent, without tools, when the agent runs out of turns.
    /// `None` makes the turn limit an error.
    fn final_answer_prompt(&self) -> Option<&str> {
        None
    }

    /// Build the loop configuration for this agent.
    fn agent_config(&self) -> AgentConfig {
        let config = AgentConfig::new(self.name())
            .with_system_prompt(self.system_prompt())
            .with_max_iterations(self.max_turns());
        match self.final_answer_prompt() {
            Some(prompt) => config.with_final_answer_prompt(prompt),
            None => config,
        }
    }
}
