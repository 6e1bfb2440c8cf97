//! Domain types for the agencyflow orchestrator.
//!
//! This module contains the core data structures:
//! - Events: Ordered progress records published by a run
//! - Run: Pipeline execution state
//! - Documents: Structured stage inputs and outputs
//! - Validation: Shape checks applied to service output

pub mod documents;
pub mod events;
pub mod run;
pub mod validation;

// Re-export commonly used types
pub use documents::{
    AudienceOutput, BriefParserInput, BriefParserOutput, CalendarOutput, CalendarSummary,
    CreativeBriefInput, CreativeBriefOutput, PerformanceInput, PerformanceOutput,
};
pub use events::{ErrorKind, Event, EventPayload, EventType, StageFailure};
pub use run::{FailedStage, PipelineStatus, Run, RunSnapshot, Stage, StageOutputs};
pub use validation::{StructuredOutput, ValidationError};
