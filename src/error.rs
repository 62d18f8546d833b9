// ABOUTME: Defines all error types for the conductor library using thiserror.
// ABOUTME: Each submodule has its own error enum, unified under ConductorError.

/// Top-level error type for the conductor library.
///
/// Only programmer-error-class failures (malformed configuration, contract
/// violations) surface through these types. Child-run and tool failures are
/// absorbed into structured results and never propagate as errors.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from orchestrator configuration and contract violations.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors from tool operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

/// Errors from the spawn record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No record for session key '{0}'")]
    NotFound(String),
}
