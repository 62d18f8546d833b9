// ABOUTME: Root module for conductor - sub-agent orchestration core.
// ABOUTME: Re-exports all public types from submodules.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod prelude;
pub mod resilience;
pub mod tool;

pub use error::ConductorError;
