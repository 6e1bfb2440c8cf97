//! Core orchestration logic.
//!
//! This module contains:
//! - RateLimiter: Token bucket shared by every outbound request
//! - ResilientCaller: Rate-limited, retrying access to the generation service
//! - EventLog: Per-run ordered event channel
//! - Graph: The static five-stage task graph
//! - Safety: Input limits applied at the entry points
//! - Orchestrator: Admission and run execution

pub mod caller;
pub mod event_log;
pub mod graph;
pub mod orchestrator;
pub mod rate_limiter;
pub mod safety;

// Re-export commonly used types
pub use caller::{CallError, ResilientCaller, RetryPolicy};
pub use event_log::{EventLog, EventStream, StreamError};
pub use graph::{Phase, StageDescriptor, TASK_GRAPH};
pub use orchestrator::{Orchestrator, OrchestratorError, RunTicket};
pub use rate_limiter::RateLimiter;
pub use safety::{InputLimits, InputViolation};
