// ABOUTME: The Orchestrator - spawns, tracks, cancels, and persists isolated child runs.
// ABOUTME: Races each run against its timeout and cancellation handle, emitting events throughout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::child::{ChildBriefing, ChildOutput, ChildRun, RunLimits};
use super::handle::CancelHandle;
use super::record::{dedup_tools, SpawnRecord, SpawnStatus, TerminalOutcome};
use super::report::{ProgressTool, ResultSlot, SubmitResultTool};
use super::store::RecordStore;
use crate::error::{SpawnError, StoreError};
use crate::events::EventBus;
use crate::tool::{Registry, ScopedRegistry, DEFAULT_ALLOWED};

/// Hard ceilings and defaults for child-run budgets.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on reasoning steps, regardless of the caller's request.
    pub max_steps_ceiling: usize,
    /// Upper bound on the time budget, regardless of the caller's request.
    pub timeout_ceiling: Duration,
    /// Step budget used when the caller does not specify one.
    pub default_max_steps: usize,
    /// Time budget used when the caller does not specify one.
    pub default_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps_ceiling: 25,
            timeout_ceiling: Duration::from_secs(600),
            default_max_steps: 10,
            default_timeout: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    /// Check that every ceiling and default is positive.
    fn validate(&self) -> Result<(), SpawnError> {
        if self.max_steps_ceiling == 0 {
            return Err(SpawnError::Configuration(
                "max_steps_ceiling must be positive".to_string(),
            ));
        }
        if self.timeout_ceiling.is_zero() {
            return Err(SpawnError::Configuration(
                "timeout_ceiling must be positive".to_string(),
            ));
        }
        if self.default_max_steps == 0 {
            return Err(SpawnError::Configuration(
                "default_max_steps must be positive".to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(SpawnError::Configuration(
                "default_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-spawn options. Budgets are clamped to the orchestrator's ceilings.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Allowlist of tool names; the documented safe default subset
    /// (`DEFAULT_ALLOWED`) is used if omitted. The fixed blocklist is
    /// subtracted after the intersection either way.
    pub tools: Option<Vec<String>>,

    /// Requested step budget.
    pub max_steps: Option<usize>,

    /// Requested time budget.
    pub timeout: Option<Duration>,

    /// Forwarded hint for the child's model-selection policy.
    pub tier: Option<String>,

    /// Free text appended to the child's briefing.
    pub context: Option<String>,
}

impl SpawnOptions {
    /// Create options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tool allowlist.
    pub fn tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the requested step budget.
    pub fn max_steps(mut self, max: usize) -> Self {
        self.max_steps = Some(max);
        self
    }

    /// Set the requested time budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the model-selection tier hint.
    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    /// Append free-text context to the child's briefing.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Outcome of a spawn, returned as an ordinary value for the caller to
/// relay. Child failures never surface as errors at this boundary.
#[derive(Debug, Clone)]
pub enum SpawnOutcome {
    /// The child run settled with a result.
    Completed {
        summary: String,
        structured: Option<serde_json::Value>,
        tools_used: Vec<String>,
        cost: f64,
        session_key: String,
    },

    /// The child run failed, timed out, or was killed.
    Failed { error: String, session_key: String },
}

impl SpawnOutcome {
    /// Session key of the run that produced this outcome.
    pub fn session_key(&self) -> &str {
        match self {
            SpawnOutcome::Completed { session_key, .. } => session_key,
            SpawnOutcome::Failed { session_key, .. } => session_key,
        }
    }

    /// True for the Completed variant.
    pub fn is_completed(&self) -> bool {
        matches!(self, SpawnOutcome::Completed { .. })
    }
}

enum Settled {
    Finished(Result<ChildOutput, anyhow::Error>),
    TimedOut,
    Cancelled,
}

/// Spawns, tracks, cancels, and persists isolated child-agent runs.
///
/// The active-handle map and the record store are the only shared mutable
/// state; both are keyed by session key and support concurrent access
/// without a global lock.
pub struct Orchestrator {
    config: OrchestratorConfig,
    tools: Registry,
    child: Arc<dyn ChildRun>,
    store: Arc<dyn RecordStore>,
    bus: Arc<EventBus>,
    active: RwLock<HashMap<String, CancelHandle>>,
    named: RwLock<HashMap<String, String>>,
}

impl Orchestrator {
    /// Create an orchestrator over the parent's full tool set.
    ///
    /// Rejects a configuration with a zero ceiling or default budget.
    pub fn new(
        config: OrchestratorConfig,
        tools: Registry,
        child: Arc<dyn ChildRun>,
        store: Arc<dyn RecordStore>,
        bus: Arc<EventBus>,
    ) -> Result<Self, SpawnError> {
        config.validate()?;
        Ok(Self {
            config,
            tools,
            child,
            store,
            bus,
            active: RwLock::new(HashMap::new()),
            named: RwLock::new(HashMap::new()),
        })
    }

    /// Run a bounded, isolated child task to completion.
    ///
    /// Persists a Running record, builds the child's tool scope and
    /// cancellation handle, races the run against its time budget, and
    /// persists exactly one terminal record when it settles. Emits a
    /// `spawn` event at creation, on each progress report, and at the
    /// terminal transition.
    pub async fn spawn(&self, name: &str, task: &str, options: SpawnOptions) -> SpawnOutcome {
        let session_key = Uuid::new_v4().to_string();
        let handle = CancelHandle::new();

        if let Err(e) = self
            .store
            .upsert(SpawnRecord::running(&session_key, name))
            .await
        {
            return SpawnOutcome::Failed {
                error: format!("failed to persist spawn record: {}", e),
                session_key,
            };
        }
        self.active
            .write()
            .await
            .insert(session_key.clone(), handle.clone());

        tracing::info!(session_key = %session_key, name, "spawning child run");
        self.bus.emit(
            "spawn",
            serde_json::json!({
                "session_key": session_key,
                "name": name,
                "phase": "started",
                "task": task,
            }),
        );

        let slot = ResultSlot::new();
        let allowed = options
            .tools
            .clone()
            .unwrap_or_else(|| DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect());
        let scoped = ScopedRegistry::new(self.tools.clone(), allowed)
            .inject(ProgressTool::new(&session_key, Arc::clone(&self.bus)))
            .inject(SubmitResultTool::new(slot.clone()));

        let limits = RunLimits {
            max_steps: options
                .max_steps
                .unwrap_or(self.config.default_max_steps)
                .min(self.config.max_steps_ceiling),
            timeout: options
                .timeout
                .unwrap_or(self.config.default_timeout)
                .min(self.config.timeout_ceiling),
        };

        let mut briefing = ChildBriefing::new(task);
        briefing.context = options.context.clone();
        briefing.tier = options.tier.clone();

        let run = self.child.run(briefing, scoped, limits, handle.clone());
        tokio::pin!(run);

        let settled = tokio::select! {
            biased;
            () = handle.cancelled() => Settled::Cancelled,
            result = &mut run => Settled::Finished(result),
            () = tokio::time::sleep(limits.timeout) => Settled::TimedOut,
        };

        // Remove the handle the instant the run settles. If it is already
        // gone, kill() won the race and owns the terminal record.
        let was_active = self
            .active
            .write()
            .await
            .remove(&session_key)
            .is_some();

        match settled {
            Settled::Cancelled => SpawnOutcome::Failed {
                error: "killed".to_string(),
                session_key,
            },
            Settled::TimedOut => {
                // Abandon the run; signal the handle so in-flight calls
                // that observe it can stop. Side effects are not undone.
                handle.cancel();
                let message = format!("timed out after {}ms", limits.timeout.as_millis());
                self.finish(
                    &session_key,
                    name,
                    TerminalOutcome::failed(SpawnStatus::Timeout, &message),
                    "timeout",
                )
                .await;
                SpawnOutcome::Failed {
                    error: message,
                    session_key,
                }
            }
            Settled::Finished(_) if !was_active => SpawnOutcome::Failed {
                error: "killed".to_string(),
                session_key,
            },
            Settled::Finished(Ok(output)) => {
                let tools_used = dedup_tools(output.tools_used);
                let (summary, structured) = match slot.take() {
                    Some(submitted) => (submitted.summary, submitted.data),
                    // Fallback when the child never called submit_result.
                    None => (output.text, None),
                };

                self.finish(
                    &session_key,
                    name,
                    TerminalOutcome::done(tools_used.clone(), output.cost),
                    "completed",
                )
                .await;

                SpawnOutcome::Completed {
                    summary,
                    structured,
                    tools_used,
                    cost: output.cost,
                    session_key,
                }
            }
            Settled::Finished(Err(e)) => {
                let message = e.to_string();
                self.finish(
                    &session_key,
                    name,
                    TerminalOutcome::failed(SpawnStatus::Error, &message),
                    "failed",
                )
                .await;
                SpawnOutcome::Failed {
                    error: message,
                    session_key,
                }
            }
        }
    }

    /// Cancel a running session out-of-band.
    ///
    /// Returns true exactly once per running session key. The record is
    /// marked Killed immediately upon signaling, without waiting for the
    /// child to actually stop.
    pub async fn kill(&self, session_key: &str) -> bool {
        let handle = self.active.write().await.remove(session_key);
        let Some(handle) = handle else {
            return false;
        };

        handle.cancel();
        tracing::info!(session_key = %session_key, "killed child run");

        let name = match self.store.get(session_key).await {
            Ok(Some(record)) => record.name,
            _ => String::new(),
        };
        self.finish(
            session_key,
            &name,
            TerminalOutcome::failed(SpawnStatus::Killed, "killed by caller"),
            "killed",
        )
        .await;
        true
    }

    /// Session keys of all currently in-flight runs.
    pub async fn list_running(&self) -> Vec<String> {
        self.active.read().await.keys().cloned().collect()
    }

    /// Most recent settled record for a label, if any.
    pub async fn get_named_session(&self, name: &str) -> Option<SpawnRecord> {
        let session_key = self.named.read().await.get(name).cloned()?;
        self.store.get(&session_key).await.ok().flatten()
    }

    /// All label-to-session-key mappings, last-write-wins per label.
    pub async fn list_named_sessions(&self) -> Vec<(String, String)> {
        self.named
            .read()
            .await
            .iter()
            .map(|(name, key)| (name.clone(), key.clone()))
            .collect()
    }

    /// Startup reconciliation: sweep stale Running records left behind by a
    /// process interruption to Interrupted. Returns the number swept.
    ///
    /// Not invoked implicitly; the host decides when reconciliation runs.
    pub async fn recover_interrupted(&self) -> Result<usize, StoreError> {
        let stale = self.store.list_running().await?;
        let active = self.active.read().await;
        let mut swept = 0;

        for record in stale {
            if active.contains_key(&record.session_key) {
                continue;
            }
            self.store
                .mark_terminal(
                    &record.session_key,
                    TerminalOutcome::failed(SpawnStatus::Interrupted, "process interrupted mid-run"),
                )
                .await?;
            tracing::warn!(
                session_key = %record.session_key,
                name = %record.name,
                "swept stale running record"
            );
            swept += 1;
        }

        Ok(swept)
    }

    /// Write the terminal record, upsert the named-session mapping, and
    /// emit the terminal event.
    async fn finish(&self, session_key: &str, name: &str, outcome: TerminalOutcome, phase: &str) {
        let status = outcome.status;
        let error = outcome.error.clone();

        if let Err(e) = self.store.mark_terminal(session_key, outcome).await {
            tracing::error!(
                session_key = %session_key,
                error = %e,
                "failed to persist terminal record"
            );
        }

        if !name.is_empty() {
            self.named
                .write()
                .await
                .insert(name.to_string(), session_key.to_string());
        }

        self.bus.emit(
            "spawn",
            serde_json::json!({
                "session_key": session_key,
                "name": name,
                "phase": phase,
                "status": status.to_string(),
                "error": error,
            }),
        );
        tracing::info!(
            session_key = %session_key,
            name,
            status = %status,
            "child run settled"
        );
    }
}
