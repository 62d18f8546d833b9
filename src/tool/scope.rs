// ABOUTME: ScopedRegistry - the isolated tool view handed to a child run.
// ABOUTME: Applies allowlist intersection, then the fixed blocklist, plus injected tools.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Registry, Tool, ToolResult, ToolSpec};
use crate::error::ToolError;

/// Tools a child run can never access, even when named explicitly in an
/// allowlist. The subtraction happens after the allowlist intersection.
pub const ALWAYS_BLOCKED: &[&str] = &["spawn_agent", "schedule", "sandbox_exec", "persona"];

/// Safe default subset used when a caller omits an allowlist.
pub const DEFAULT_ALLOWED: &[&str] = &["web_search", "web_fetch", "read_file", "list_files"];

/// An isolated view of a parent Registry for one child run.
///
/// The visible tool set is (parent tools ∩ allowlist) minus
/// `ALWAYS_BLOCKED`, plus any tools injected by the orchestrator
/// (progress reporting and result submission). Injected tools exist only
/// in this scope, never in the parent registry.
pub struct ScopedRegistry {
    source: Registry,
    allowed: Vec<String>,
    injected: HashMap<String, Arc<dyn Tool>>,
}

impl ScopedRegistry {
    /// Create a scope over `source` restricted to `allowed`.
    pub fn new(source: Registry, allowed: Vec<String>) -> Self {
        Self {
            source,
            allowed,
            injected: HashMap::new(),
        }
    }

    /// Create a scope with the documented safe default allowlist.
    pub fn with_defaults(source: Registry) -> Self {
        Self::new(
            source,
            DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Add an orchestrator-provided tool visible only inside this scope.
    pub fn inject(mut self, tool: impl Tool + 'static) -> Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        self.injected.insert(tool.name().to_string(), tool);
        self
    }

    /// Check whether a parent tool name is visible in this scope.
    ///
    /// The blocklist is checked after the allowlist so an allowlist naming a
    /// blocked tool cannot bypass the restriction.
    pub fn is_allowed(&self, name: &str) -> bool {
        if !self.allowed.iter().any(|a| a == name) {
            return false;
        }
        !ALWAYS_BLOCKED.contains(&name)
    }

    /// Get a tool by name if it is visible in this scope.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if let Some(tool) = self.injected.get(name) {
            return Some(Arc::clone(tool));
        }
        if !self.is_allowed(name) {
            return None;
        }
        self.source.get(name).await
    }

    /// List all visible tool names, injected tools last.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .source
            .list()
            .await
            .into_iter()
            .filter(|name| self.is_allowed(name))
            .collect();
        let mut injected: Vec<String> = self.injected.keys().cloned().collect();
        injected.sort();
        names.extend(injected);
        names
    }

    /// Validate and execute a tool by name.
    ///
    /// Looks the tool up in this scope, runs its input validation, then
    /// executes it. Expected, user-facing failures still come back as
    /// `ToolResult::error(..)`; the `Err` cases here are contract
    /// violations that fail the enclosing run.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .await
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.validate_input(&params)
            .map_err(ToolError::InvalidParams)?;
        tool.execute(params).await.map_err(ToolError::Execution)
    }

    /// Get all visible tools.
    pub async fn all(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self
            .source
            .all()
            .await
            .into_iter()
            .filter(|t| self.is_allowed(t.name()))
            .collect();
        tools.extend(self.injected.values().cloned());
        tools
    }

    /// Describe all visible tools for the child-run mechanism.
    pub async fn to_specs(&self) -> Vec<ToolSpec> {
        self.all()
            .await
            .iter()
            .map(|t| ToolSpec::of(t.as_ref()))
            .collect()
    }

    /// Number of visible tools.
    pub async fn count(&self) -> usize {
        self.list().await.len()
    }
}

impl Clone for ScopedRegistry {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            allowed: self.allowed.clone(),
            injected: self.injected.clone(),
        }
    }
}
