// ABOUTME: Record store contract plus in-memory and JSON-lines backed implementations.
// ABOUTME: Terminal writes are first-write-wins; concurrent upserts to distinct keys are safe.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::record::{SpawnRecord, SpawnStatus, TerminalOutcome};
use crate::error::StoreError;

/// Trait for persisting spawn records.
///
/// Implementations must tolerate concurrent upserts to distinct keys.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record for its session key.
    async fn upsert(&self, record: SpawnRecord) -> Result<(), StoreError>;

    /// Apply the single terminal transition to a record.
    ///
    /// Computes `completed_at` and `duration_ms`. If the record is already
    /// terminal the call is a no-op, preserving the first terminal write.
    /// Returns `StoreError::NotFound` for an unknown session key.
    async fn mark_terminal(
        &self,
        session_key: &str,
        outcome: TerminalOutcome,
    ) -> Result<(), StoreError>;

    /// Get a record by session key.
    async fn get(&self, session_key: &str) -> Result<Option<SpawnRecord>, StoreError>;

    /// Get the most recent record for a label (last-write-wins per name).
    async fn get_by_name(&self, name: &str) -> Result<Option<SpawnRecord>, StoreError>;

    /// List the `n` most recently started records, newest first.
    async fn list_recent(&self, n: usize) -> Result<Vec<SpawnRecord>, StoreError>;

    /// List all records still in Running state.
    async fn list_running(&self) -> Result<Vec<SpawnRecord>, StoreError>;
}

fn apply_terminal(record: &mut SpawnRecord, outcome: TerminalOutcome) -> bool {
    if record.status.is_terminal() {
        return false;
    }

    let completed_at = Utc::now();
    record.status = outcome.status;
    record.tools_used = outcome.tools_used;
    record.cost = outcome.cost;
    record.error = outcome.error;
    record.completed_at = Some(completed_at);
    record.duration_ms = Some(
        (completed_at - record.started_at)
            .num_milliseconds()
            .max(0) as u64,
    );
    true
}

fn most_recent_by_name(records: &HashMap<String, SpawnRecord>, name: &str) -> Option<SpawnRecord> {
    records
        .values()
        .filter(|r| r.name == name)
        .max_by_key(|r| r.started_at)
        .cloned()
}

fn recent(records: &HashMap<String, SpawnRecord>, n: usize) -> Vec<SpawnRecord> {
    let mut all: Vec<SpawnRecord> = records.values().cloned().collect();
    all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    all.truncate(n);
    all
}

/// In-memory record store.
///
/// Useful for testing and hosts that provide their own persistence.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, SpawnRecord>>,
}

impl MemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, record: SpawnRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.session_key.clone(), record);
        Ok(())
    }

    async fn mark_terminal(
        &self,
        session_key: &str,
        outcome: TerminalOutcome,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(session_key)
            .ok_or_else(|| StoreError::NotFound(session_key.to_string()))?;
        apply_terminal(record, outcome);
        Ok(())
    }

    async fn get(&self, session_key: &str) -> Result<Option<SpawnRecord>, StoreError> {
        Ok(self.records.read().await.get(session_key).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<SpawnRecord>, StoreError> {
        Ok(most_recent_by_name(&*self.records.read().await, name))
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<SpawnRecord>, StoreError> {
        Ok(recent(&*self.records.read().await, n))
    }

    async fn list_running(&self) -> Result<Vec<SpawnRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == SpawnStatus::Running)
            .cloned()
            .collect())
    }
}

/// JSON-lines backed record store.
///
/// Every write appends the full record as one JSON line; on open the file is
/// replayed and the last line per session key wins. A process restart
/// therefore observes the last-known status of every run, including stale
/// Running records left by an interruption.
pub struct JsonlRecordStore {
    path: PathBuf,
    records: RwLock<HashMap<String, SpawnRecord>>,
    // Serializes appends so concurrent writers never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlRecordStore {
    /// Open a store at `path`, replaying existing records if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut records = HashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    let record: SpawnRecord = serde_json::from_str(line)?;
                    records.insert(record.session_key.clone(), record);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
        })
    }

    async fn append(&self, record: &SpawnRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn upsert(&self, record: SpawnRecord) -> Result<(), StoreError> {
        self.append(&record).await?;
        self.records
            .write()
            .await
            .insert(record.session_key.clone(), record);
        Ok(())
    }

    async fn mark_terminal(
        &self,
        session_key: &str,
        outcome: TerminalOutcome,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut records = self.records.write().await;
            let record = records
                .get_mut(session_key)
                .ok_or_else(|| StoreError::NotFound(session_key.to_string()))?;
            if !apply_terminal(record, outcome) {
                return Ok(());
            }
            record.clone()
        };
        self.append(&updated).await
    }

    async fn get(&self, session_key: &str) -> Result<Option<SpawnRecord>, StoreError> {
        Ok(self.records.read().await.get(session_key).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<SpawnRecord>, StoreError> {
        Ok(most_recent_by_name(&*self.records.read().await, name))
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<SpawnRecord>, StoreError> {
        Ok(recent(&*self.records.read().await, n))
    }

    async fn list_running(&self) -> Result<Vec<SpawnRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == SpawnStatus::Running)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_upsert_and_get() {
        let store = MemoryRecordStore::new();
        store
            .upsert(SpawnRecord::running("sess-1", "ResearchAgent"))
            .await
            .unwrap();

        let record = store.get("sess-1").await.unwrap().unwrap();
        assert_eq!(record.name, "ResearchAgent");
        assert_eq!(record.status, SpawnStatus::Running);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_terminal_sets_duration_and_completed_at() {
        let store = MemoryRecordStore::new();
        store
            .upsert(SpawnRecord::running("sess-1", "agent"))
            .await
            .unwrap();

        store
            .mark_terminal(
                "sess-1",
                TerminalOutcome::done(vec!["web_search".into()], 0.01),
            )
            .await
            .unwrap();

        let record = store.get("sess-1").await.unwrap().unwrap();
        assert_eq!(record.status, SpawnStatus::Done);
        assert_eq!(record.tools_used, vec!["web_search"]);
        assert!(record.completed_at.is_some());
        assert!(record.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_second_terminal_write_is_ignored() {
        let store = MemoryRecordStore::new();
        store
            .upsert(SpawnRecord::running("sess-1", "agent"))
            .await
            .unwrap();

        store
            .mark_terminal(
                "sess-1",
                TerminalOutcome::failed(SpawnStatus::Killed, "killed"),
            )
            .await
            .unwrap();
        store
            .mark_terminal("sess-1", TerminalOutcome::done(vec![], 1.0))
            .await
            .unwrap();

        // First terminal write wins.
        let record = store.get("sess-1").await.unwrap().unwrap();
        assert_eq!(record.status, SpawnStatus::Killed);
    }

    #[tokio::test]
    async fn test_mark_terminal_unknown_key_errors() {
        let store = MemoryRecordStore::new();
        let result = store
            .mark_terminal("ghost", TerminalOutcome::done(vec![], 0.0))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_by_name_returns_most_recent() {
        let store = MemoryRecordStore::new();

        let mut first = SpawnRecord::running("sess-1", "ResearchAgent");
        first.started_at = Utc::now() - chrono::Duration::seconds(10);
        store.upsert(first).await.unwrap();
        store
            .upsert(SpawnRecord::running("sess-2", "ResearchAgent"))
            .await
            .unwrap();

        let record = store.get_by_name("ResearchAgent").await.unwrap().unwrap();
        assert_eq!(record.session_key, "sess-2");
        assert!(store.get_by_name("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_running_and_recent() {
        let store = MemoryRecordStore::new();

        let mut old = SpawnRecord::running("sess-1", "a");
        old.started_at = Utc::now() - chrono::Duration::seconds(60);
        store.upsert(old).await.unwrap();
        store.upsert(SpawnRecord::running("sess-2", "b")).await.unwrap();
        store
            .mark_terminal("sess-1", TerminalOutcome::done(vec![], 0.0))
            .await
            .unwrap();

        let running = store.list_running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].session_key, "sess-2");

        let recent = store.list_recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].session_key, "sess-2");
    }

    #[tokio::test]
    async fn test_jsonl_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spawns.jsonl");

        {
            let store = JsonlRecordStore::open(&path).await.unwrap();
            store
                .upsert(SpawnRecord::running("sess-1", "ResearchAgent"))
                .await
                .unwrap();
            store
                .upsert(SpawnRecord::running("sess-2", "Writer"))
                .await
                .unwrap();
            store
                .mark_terminal("sess-1", TerminalOutcome::done(vec!["web_search".into()], 0.02))
                .await
                .unwrap();
        }

        // A "restarted process" observes the last-known status of each run.
        let store = JsonlRecordStore::open(&path).await.unwrap();
        let done = store.get("sess-1").await.unwrap().unwrap();
        assert_eq!(done.status, SpawnStatus::Done);
        assert_eq!(done.tools_used, vec!["web_search"]);

        let stale = store.get("sess-2").await.unwrap().unwrap();
        assert_eq!(stale.status, SpawnStatus::Running);
    }

    #[tokio::test]
    async fn test_jsonl_store_open_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlRecordStore::open(dir.path().join("fresh.jsonl"))
            .await
            .unwrap();
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }
}
