// ABOUTME: ChildRun contract - the external model-call loop the orchestrator delegates to.
// ABOUTME: Defines the briefing, limits, and output exchanged with a child run.

use async_trait::async_trait;

use super::handle::CancelHandle;
use crate::tool::ScopedRegistry;

/// Objective handed to a child run.
#[derive(Debug, Clone)]
pub struct ChildBriefing {
    /// Objective text, passed verbatim.
    pub task: String,

    /// Free text appended to the child's briefing.
    pub context: Option<String>,

    /// Forwarded hint for the child's model-selection policy.
    pub tier: Option<String>,
}

impl ChildBriefing {
    /// Create a briefing for a task.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            context: None,
            tier: None,
        }
    }

    /// Append free-text context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the model-selection tier hint.
    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }
}

/// Step and time budgets for a child run, clamped to hard ceilings by the
/// orchestrator before launch.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Maximum reasoning steps.
    pub max_steps: usize,

    /// Time budget; the orchestrator races the run against this.
    pub timeout: std::time::Duration,
}

/// What a child run produces when it settles on its own.
#[derive(Debug, Clone)]
pub struct ChildOutput {
    /// Final freeform text from the child.
    pub text: String,

    /// Names of tools the child used; may contain duplicates, the
    /// orchestrator deduplicates before persisting.
    pub tools_used: Vec<String>,

    /// Accumulated cost of the run.
    pub cost: f64,
}

/// The child-run mechanism: an isolated, bounded invocation of the agent
/// logic, scoped to one delegated task.
///
/// Implementations should check `cancel` at every suspension point. Tool
/// calls issued within one reasoning step may execute concurrently; the
/// orchestrator serializes only the overall run.
#[async_trait]
pub trait ChildRun: Send + Sync {
    async fn run(
        &self,
        briefing: ChildBriefing,
        tools: ScopedRegistry,
        limits: RunLimits,
        cancel: CancelHandle,
    ) -> Result<ChildOutput, anyhow::Error>;
}
