// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use conductor::prelude::*;` to get started quickly.

pub use crate::error::{ConductorError, SpawnError, StoreError, ToolError};
pub use crate::events::{Event, EventBus, Subscriber, SubscriptionId};
pub use crate::orchestrator::{
    CancelHandle, ChildBriefing, ChildOutput, ChildRun, JsonlRecordStore, MemoryRecordStore,
    Orchestrator, OrchestratorConfig, RecordStore, RunLimits, SpawnOptions, SpawnOutcome,
    SpawnRecord, SpawnStatus, TerminalOutcome,
};
pub use crate::resilience::{with_retry, with_retry_if, BreakerRegistry, CircuitBreaker, RetryOptions};
pub use crate::tool::{Registry, ScopedRegistry, Tool, ToolResult, ToolSpec};
