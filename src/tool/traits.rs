// ABOUTME: Defines the Tool trait - the core abstraction for agent capabilities.
// ABOUTME: Tools have a name, description, schema, input validation, and async execute.

use async_trait::async_trait;

use super::ToolResult;

/// A tool that can be executed by an agent.
///
/// Expected, user-facing failures return `ToolResult::error(..)`; an `Err`
/// from `execute` is treated as an unexpected failure and fails the
/// enclosing run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a human-readable description for the model.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's input parameters.
    fn schema(&self) -> serde_json::Value;

    /// Validate input before execution. The default accepts everything;
    /// tools with cheap structural checks should override this.
    fn validate_input(&self, _params: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error>;
}

/// Declarative description of a tool, handed to the child-run mechanism.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// Build a spec from a tool.
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.schema(),
        }
    }
}
