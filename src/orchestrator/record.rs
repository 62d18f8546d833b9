// ABOUTME: Spawn record types - the persisted lifecycle state of a child run.
// ABOUTME: Status is monotonic: Running precedes exactly one terminal value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one child-agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    /// The run is in flight.
    Running,
    /// The run finished and produced a result.
    Done,
    /// The run failed with an error.
    Error,
    /// The run exceeded its time budget and was abandoned.
    Timeout,
    /// The run was cancelled out-of-band via kill.
    Killed,
    /// A stale Running record swept at startup after a process interruption.
    Interrupted,
}

impl SpawnStatus {
    /// True for every status except Running.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpawnStatus::Running)
    }
}

impl std::fmt::Display for SpawnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SpawnStatus::Running => "running",
            SpawnStatus::Done => "done",
            SpawnStatus::Error => "error",
            SpawnStatus::Timeout => "timeout",
            SpawnStatus::Killed => "killed",
            SpawnStatus::Interrupted => "interrupted",
        };
        write!(f, "{}", label)
    }
}

/// Persisted record of one child-agent run.
///
/// Written once in Running state before launch; updated exactly once with a
/// terminal status after settlement, so a process restart can observe the
/// last-known status of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRecord {
    /// Unique identifier for the run's isolated execution namespace.
    pub session_key: String,

    /// Human-chosen label, addressable via the named-session mapping.
    pub name: String,

    /// Current lifecycle state.
    pub status: SpawnStatus,

    /// Names of tools the child actually used, deduplicated.
    pub tools_used: Vec<String>,

    /// Accumulated cost reported by the child run.
    pub cost: f64,

    /// Wall-clock duration, set at the terminal transition.
    pub duration_ms: Option<u64>,

    /// When the run was launched.
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message for Error/Timeout/Killed/Interrupted records.
    pub error: Option<String>,
}

impl SpawnRecord {
    /// Create a fresh Running record.
    pub fn running(session_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            name: name.into(),
            status: SpawnStatus::Running,
            tools_used: Vec::new(),
            cost: 0.0,
            duration_ms: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Fields written at the single terminal transition of a record.
#[derive(Debug, Clone)]
pub struct TerminalOutcome {
    pub status: SpawnStatus,
    pub tools_used: Vec<String>,
    pub cost: f64,
    pub error: Option<String>,
}

impl TerminalOutcome {
    /// Terminal outcome for a successful run.
    pub fn done(tools_used: Vec<String>, cost: f64) -> Self {
        Self {
            status: SpawnStatus::Done,
            tools_used,
            cost,
            error: None,
        }
    }

    /// Terminal outcome carrying an error message.
    pub fn failed(status: SpawnStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            tools_used: Vec::new(),
            cost: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Deduplicate tool names, keeping first-seen order.
pub fn dedup_tools(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!SpawnStatus::Running.is_terminal());
        for status in [
            SpawnStatus::Done,
            SpawnStatus::Error,
            SpawnStatus::Timeout,
            SpawnStatus::Killed,
            SpawnStatus::Interrupted,
        ] {
            assert!(status.is_terminal(), "{} should be terminal", status);
        }
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let tools = dedup_tools(
            ["web_search", "read_file", "web_search", "read_file"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(tools, vec!["web_search", "read_file"]);
    }

    #[test]
    fn test_running_record_defaults() {
        let record = SpawnRecord::running("sess-1", "ResearchAgent");
        assert_eq!(record.status, SpawnStatus::Running);
        assert!(record.tools_used.is_empty());
        assert!(record.completed_at.is_none());
        assert!(record.duration_ms.is_none());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = SpawnRecord::running("sess-1", "ResearchAgent");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"running\""));

        let parsed: SpawnRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_key, "sess-1");
        assert_eq!(parsed.status, SpawnStatus::Running);
    }
}
