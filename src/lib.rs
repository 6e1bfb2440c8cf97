//! agencyflow - Multi-stage campaign planning pipeline
//!
//! Turns a free-text marketing brief into five structured documents by
//! driving an external generation service through a fixed task graph.
//!
//! # Architecture
//!
//! - Three stages run in sequence (brief parsing, audience research,
//!   content calendar), then two run concurrently (creative brief and
//!   performance report) and are joined as a unit
//! - Every outbound request goes through one shared token bucket and a
//!   retry policy that only retries rate limiting and unavailability
//! - Progress is published as an ordered event stream ending in a sentinel
//! - At most one run is active at a time
//!
//! # Modules
//!
//! - `adapters`: Generation service transport (Gemini)
//! - `core`: Orchestration (RateLimiter, ResilientCaller, EventLog, graph, Orchestrator)
//! - `domain`: Data structures (Event, Run, documents, validation)
//! - `tasks`: Prompt construction for each stage
//! - `ingest`: Brief files
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline on a brief
//! agencyflow run --input brief.md
//!
//! # Follow raw events
//! cat brief.txt | agencyflow run --json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod tasks;

// Re-export main types at crate root for convenience
pub use core::{EventStream, Orchestrator, OrchestratorError, RunTicket};
pub use domain::{Event, EventPayload, PipelineStatus, RunSnapshot, Stage};
