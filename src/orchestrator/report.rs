// ABOUTME: Tools injected only into child scope - progress reporting and result submission.
// ABOUTME: Progress forwards to the event bus; submitted results fill a shared slot.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::events::EventBus;
use crate::tool::{Tool, ToolResult};

/// Structured final answer a child submits via the `submit_result` tool.
#[derive(Debug, Clone)]
pub struct FinalResult {
    pub summary: String,
    pub data: Option<serde_json::Value>,
}

/// Shared slot the orchestrator reads after the run settles.
///
/// Freeform text from the child output is the fallback when the child never
/// calls `submit_result`.
#[derive(Clone, Default)]
pub struct ResultSlot {
    inner: Arc<Mutex<Option<FinalResult>>>,
}

impl ResultSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result; a later submission replaces an earlier one.
    pub fn set(&self, result: FinalResult) {
        *self.inner.lock().unwrap() = Some(result);
    }

    /// Take the submitted result, leaving the slot empty.
    pub fn take(&self) -> Option<FinalResult> {
        self.inner.lock().unwrap().take()
    }
}

/// Child-scope tool that forwards a progress message to the event bus.
pub struct ProgressTool {
    session_key: String,
    bus: Arc<EventBus>,
}

impl ProgressTool {
    pub fn new(session_key: impl Into<String>, bus: Arc<EventBus>) -> Self {
        Self {
            session_key: session_key.into(),
            bus,
        }
    }
}

#[async_trait]
impl Tool for ProgressTool {
    fn name(&self) -> &str {
        "report_progress"
    }

    fn description(&self) -> &str {
        "Report intermediate progress on the current task. Use this to keep the \
         requesting agent informed during long-running work."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "A short progress update"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: message"))?;

        self.bus.emit(
            "spawn",
            serde_json::json!({
                "session_key": self.session_key,
                "phase": "progress",
                "message": message,
            }),
        );

        Ok(ToolResult::text("progress reported"))
    }
}

/// Child-scope tool the child is instructed to call with its final answer.
pub struct SubmitResultTool {
    slot: ResultSlot,
}

impl SubmitResultTool {
    pub fn new(slot: ResultSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl Tool for SubmitResultTool {
    fn name(&self) -> &str {
        "submit_result"
    }

    fn description(&self) -> &str {
        "Submit the final answer for the current task. Call this exactly once \
         when the task is complete, with a summary and optional structured data."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Final answer as plain text"
                },
                "data": {
                    "type": "object",
                    "description": "Optional machine-readable result data"
                }
            },
            "required": ["summary"]
        })
    }

    fn validate_input(&self, params: &serde_json::Value) -> Result<(), String> {
        if params.get("summary").and_then(|v| v.as_str()).is_none() {
            return Err("summary is required".to_string());
        }
        Ok(())
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let summary = params
            .get("summary")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: summary"))?;

        self.slot.set(FinalResult {
            summary: summary.to_string(),
            data: params.get("data").cloned(),
        });

        Ok(ToolResult::text("result recorded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_progress_tool_forwards_to_bus() {
        let bus = EventBus::shared();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        bus.subscribe(move |event: &Event| {
            seen_clone.lock().unwrap().push(event.payload.clone());
            Ok(())
        });

        let tool = ProgressTool::new("sess-1", bus);
        let result = tool
            .execute(serde_json::json!({"message": "halfway there"}))
            .await
            .unwrap();

        assert!(!result.is_error);
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["session_key"], "sess-1");
        assert_eq!(events[0]["phase"], "progress");
        assert_eq!(events[0]["message"], "halfway there");
    }

    #[tokio::test]
    async fn test_progress_tool_requires_message() {
        let tool = ProgressTool::new("sess-1", EventBus::shared());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_submit_result_fills_slot() {
        let slot = ResultSlot::new();
        let tool = SubmitResultTool::new(slot.clone());

        tool.execute(serde_json::json!({
            "summary": "Paris",
            "data": {"capital": "Paris"}
        }))
        .await
        .unwrap();

        let result = slot.take().unwrap();
        assert_eq!(result.summary, "Paris");
        assert_eq!(result.data.unwrap()["capital"], "Paris");
        // Slot is drained after take.
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_submit_result_validates_summary() {
        let tool = SubmitResultTool::new(ResultSlot::new());
        assert!(tool.validate_input(&serde_json::json!({})).is_err());
        assert!(tool
            .validate_input(&serde_json::json!({"summary": "Paris"}))
            .is_ok());
    }

    #[tokio::test]
    async fn test_later_submission_replaces_earlier() {
        let slot = ResultSlot::new();
        let tool = SubmitResultTool::new(slot.clone());

        tool.execute(serde_json::json!({"summary": "draft"}))
            .await
            .unwrap();
        tool.execute(serde_json::json!({"summary": "final"}))
            .await
            .unwrap();

        assert_eq!(slot.take().unwrap().summary, "final");
    }
}
