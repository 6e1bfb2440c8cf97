//! Progress events published by a run.
//!
//! Every run owns an ordered log of these. Sequence ids start at 1 and
//! increase by one per event; the log ends with a sentinel that is not an
//! [`Event`] itself (see `core::event_log`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::run::{FailedStage, PipelineStatus, Stage};

/// Maximum length of an error message carried in a failure event
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2000;

/// A single event in a run's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the run's log, starting at 1
    pub sequence_id: u64,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// When this event was published
    pub timestamp: DateTime<Utc>,

    /// Kind-specific data
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(sequence_id: u64, run_id: Uuid, payload: EventPayload) -> Self {
        Self {
            sequence_id,
            run_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Whether this event marks a run as finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type(),
            EventType::RunComplete | EventType::RunFailed
        )
    }

    /// Whether this event delivers a finished stage document.
    ///
    /// The secondary branch reports its document through a branch status
    /// event rather than a stage-complete event.
    pub fn is_stage_completion(&self) -> bool {
        match &self.payload {
            EventPayload::StageComplete { .. } => true,
            EventPayload::BranchStatus { output, .. } => output.is_some(),
            _ => false,
        }
    }
}

/// Event kinds with their payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The run entered a new processing status
    StageStatus {
        stage: Stage,
        status: PipelineStatus,
        elapsed_ms: u64,
    },

    /// A stage finished and its document was stored
    StageComplete { stage: Stage, output: Value },

    /// Progress of the secondary (report) branch of the fan-out
    BranchStatus {
        stage: Stage,
        status: PipelineStatus,
        #[serde(default)]
        output: Option<Value>,
    },

    /// The run failed; no further events follow
    RunFailed {
        failed_stage: FailedStage,
        error: StageFailure,
    },

    /// All stages finished; no further events follow
    RunComplete { elapsed_ms: u64 },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::StageStatus { .. } => EventType::StageStatus,
            Self::StageComplete { .. } => EventType::StageComplete,
            Self::BranchStatus { .. } => EventType::BranchStatus,
            Self::RunFailed { .. } => EventType::RunFailed,
            Self::RunComplete { .. } => EventType::RunComplete,
        }
    }
}

/// Discriminant of [`EventPayload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StageStatus,
    StageComplete,
    BranchStatus,
    RunFailed,
    RunComplete,
}

/// Classification of a run failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Service output did not match the expected document shape
    Validation,
    /// Service signalled rate limiting or unavailability
    RateLimited,
    /// Transient signals persisted through every attempt
    RetriesExhausted,
    /// A request exceeded its deadline
    Timeout,
    /// Input rejected before any request was made
    InvalidInput,
    /// Service returned a non-transient error status
    Service,
    /// Connection-level failure or unusable response
    Transport,
    /// The run's own task aborted
    Internal,
}

impl ErrorKind {
    /// Whether a fresh run has a reasonable chance of succeeding
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Validation | Self::RateLimited | Self::RetriesExhausted | Self::Timeout
        )
    }
}

/// Structured error carried by a failure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: FailedStage,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl StageFailure {
    pub fn new(stage: FailedStage, kind: ErrorKind, message: &str) -> Self {
        Self {
            stage,
            kind,
            message: truncate_message(message, MAX_ERROR_MESSAGE_CHARS),
            retryable: kind.is_retryable(),
        }
    }
}

/// Cut a message to at most `max` chars without splitting a code point
pub fn truncate_message(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
