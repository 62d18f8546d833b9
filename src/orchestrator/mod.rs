// ABOUTME: Sub-agent orchestration module - spawn and manage isolated child runs.
// ABOUTME: Contains records, the record store, cancellation, the child-run contract, and the Orchestrator.

mod child;
mod handle;
mod orchestrator;
mod record;
mod report;
mod store;

pub use child::{ChildBriefing, ChildOutput, ChildRun, RunLimits};
pub use handle::CancelHandle;
pub use orchestrator::{Orchestrator, OrchestratorConfig, SpawnOptions, SpawnOutcome};
pub use record::{dedup_tools, SpawnRecord, SpawnStatus, TerminalOutcome};
pub use report::{FinalResult, ProgressTool, ResultSlot, SubmitResultTool};
pub use store::{JsonlRecordStore, MemoryRecordStore, RecordStore};
