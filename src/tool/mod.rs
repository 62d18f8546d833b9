// ABOUTME: Tool abstraction - the capability interface agents invoke during a run.
// ABOUTME: Contains the Tool trait, results, the registry, and child-scope filtering.

mod registry;
mod result;
mod scope;
mod traits;

pub use registry::Registry;
pub use result::ToolResult;
pub use scope::{ScopedRegistry, ALWAYS_BLOCKED, DEFAULT_ALLOWED};
pub use traits::{Tool, ToolSpec};
