//! Run state.
//!
//! A Run represents a single execution of the five-stage campaign pipeline.
//! It is created on admission, mutated only by the task driving it, and
//! frozen once its status becomes terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use super::documents::{
    AudienceOutput, BriefParserOutput, CalendarOutput, CreativeBriefOutput, PerformanceOutput,
};
use super::events::{Event, EventPayload, StageFailure};

/// A pipeline execution run
#[derive(Debug)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Brief text provided to the pipeline
    pub input: String,

    /// Short digest of the input, safe to log
    pub input_digest: String,

    /// File the brief was read from, if any
    pub source_name: Option<String>,

    /// Current status
    pub status: PipelineStatus,

    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,

    /// Monotonic start of execution (set once)
    started_at: Option<Instant>,

    /// Set when the status becomes terminal; elapsed time stops here
    finished_at: Option<Instant>,

    /// Documents produced by completed stages
    pub outputs: StageOutputs,

    /// Failure details, once failed
    pub error: Option<StageFailure>,

    /// Stage the failure was attributed to
    pub failed_stage: Option<FailedStage>,

    /// Every event published so far, in order
    history: Vec<Event>,

    /// Sequence id the next event will receive
    next_sequence_id: u64,
}

impl Run {
    /// Create a new run in the `idle` status
    pub fn new(id: Uuid, input: String, source_name: Option<String>) -> Self {
        let input_digest = hash_input(&input);
        Self {
            id,
            input,
            input_digest,
            source_name,
            status: PipelineStatus::Idle,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            outputs: StageOutputs::default(),
            error: None,
            failed_stage: None,
            history: Vec::new(),
            next_sequence_id: 1,
        }
    }

    /// Start the execution clock; later calls are ignored
    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Milliseconds from execution start to now, or to the terminal status
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Instant::now);
        self.started_at
            .map(|start| end.saturating_duration_since(start).as_millis() as u64)
            .unwrap_or(0)
    }

    /// Move to a new status. Terminal runs are immutable, so this is a
    /// no-op (returning false) once the run has completed or failed.
    pub fn set_status(&mut self, status: PipelineStatus) -> bool {
        if self.status.is_terminal() {
            warn!(
                run_id = %self.id,
                from = %self.status,
                to = %status,
                "Ignoring status change on finished run"
            );
            return false;
        }
        if status.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
        self.status = status;
        true
    }

    /// Assign the next sequence id to a payload and append it to the history
    pub fn record(&mut self, payload: EventPayload) -> Event {
        let event = Event::new(self.next_sequence_id, self.id, payload);
        self.next_sequence_id += 1;
        self.history.push(event.clone());
        event
    }

    /// Mark the run failed with the given attribution
    pub fn fail(&mut self, stage: FailedStage, failure: StageFailure) {
        if self.set_status(PipelineStatus::Failed) {
            self.failed_stage = Some(stage);
            self.error = Some(failure);
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.history
    }

    /// Owned copy of the observable state
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            status: self.status,
            source_name: self.source_name.clone(),
            input_digest: self.input_digest.clone(),
            created_at: self.created_at,
            elapsed_ms: self.elapsed_ms(),
            outputs: self.outputs.clone(),
            error: self.error.clone(),
            failed_stage: self.failed_stage,
            events: self.history.clone(),
        }
    }
}

/// Point-in-time view of a run, returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub status: PipelineStatus,
    pub source_name: Option<String>,
    pub input_digest: String,
    pub created_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outputs: StageOutputs,
    pub error: Option<StageFailure>,
    pub failed_stage: Option<FailedStage>,
    pub events: Vec<Event>,
}

/// One slot per stage; empty until that stage succeeds
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageOutputs {
    pub brief: Option<BriefParserOutput>,
    pub audience: Option<AudienceOutput>,
    pub calendar: Option<CalendarOutput>,
    pub creative_brief: Option<CreativeBriefOutput>,
    pub performance: Option<PerformanceOutput>,
}

impl StageOutputs {
    pub fn is_filled(&self, stage: Stage) -> bool {
        match stage {
            Stage::BriefParse => self.brief.is_some(),
            Stage::AudienceResearch => self.audience.is_some(),
            Stage::ContentCalendar => self.calendar.is_some(),
            Stage::CreativeBrief => self.creative_brief.is_some(),
            Stage::PerformanceReport => self.performance.is_some(),
        }
    }

    pub fn is_complete(&self) -> bool {
        Stage::ALL.iter().all(|s| self.is_filled(*s))
    }

    /// Attribute a failure to the first empty slot.
    ///
    /// When both fan-out slots are empty the pair is blamed as a unit, since
    /// neither branch's outcome is observable before the join.
    pub fn first_missing(&self) -> FailedStage {
        for stage in [Stage::BriefParse, Stage::AudienceResearch, Stage::ContentCalendar] {
            if !self.is_filled(stage) {
                return FailedStage::Stage(stage);
            }
        }

        match (
            self.is_filled(Stage::CreativeBrief),
            self.is_filled(Stage::PerformanceReport),
        ) {
            (false, false) => FailedStage::FanOut,
            (false, true) => FailedStage::Stage(Stage::CreativeBrief),
            (true, false) => FailedStage::Stage(Stage::PerformanceReport),
            (true, true) => FailedStage::Unknown,
        }
    }
}

/// Named units of work in the task graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BriefParse,
    AudienceResearch,
    ContentCalendar,
    CreativeBrief,
    PerformanceReport,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::BriefParse,
        Stage::AudienceResearch,
        Stage::ContentCalendar,
        Stage::CreativeBrief,
        Stage::PerformanceReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BriefParse => "brief_parse",
            Self::AudienceResearch => "audience_research",
            Self::ContentCalendar => "content_calendar",
            Self::CreativeBrief => "creative_brief",
            Self::PerformanceReport => "performance_report",
        }
    }

    /// Human-readable label for progress output
    pub fn label(self) -> &'static str {
        match self {
            Self::BriefParse => "Brief Parser",
            Self::AudienceResearch => "Audience Research",
            Self::ContentCalendar => "Content Calendar",
            Self::CreativeBrief => "Creative Brief",
            Self::PerformanceReport => "Performance Report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a failure was attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FailedStage {
    /// A single stage
    Stage(Stage),
    /// The fan-out pair, joined as a unit
    FanOut,
    /// Every slot was filled yet the run failed
    Unknown,
}

impl FailedStage {
    pub const FAN_OUT_NAME: &'static str = "creative_brief_or_performance_report";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage(stage) => stage.as_str(),
            Self::FanOut => Self::FAN_OUT_NAME,
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailedStage> for String {
    fn from(stage: FailedStage) -> Self {
        stage.as_str().to_string()
    }
}

impl FromStr for FailedStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::FAN_OUT_NAME {
            return Ok(Self::FanOut);
        }
        if s == "unknown" {
            return Ok(Self::Unknown);
        }
        Stage::ALL
            .iter()
            .find(|stage| stage.as_str() == s)
            .map(|stage| Self::Stage(*stage))
            .ok_or_else(|| format!("unknown stage: {}", s))
    }
}

impl TryFrom<String> for FailedStage {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Idle,
    Parsing,
    Researching,
    Calendaring,
    Briefing,
    Reporting,
    Complete,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Researching => "researching",
            Self::Calendaring => "calendaring",
            Self::Briefing => "briefing",
            Self::Reporting => "reporting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether a tracked run in this status allows a new run to be admitted
    pub fn admits_new_run(self) -> bool {
        matches!(self, Self::Idle | Self::Complete | Self::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash input content (first 16 chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_run_creation() {
        let run_id = Uuid::new_v4();
        let run = Run::new(run_id, "brief text".to_string(), None);

        assert_eq!(run.id, run_id);
        assert_eq!(run.status, PipelineStatus::Idle);
        assert_eq!(run.elapsed_ms(), 0);
        assert!(run.events().is_empty());
        assert_eq!(run.input_digest.len(), 16);
    }

    #[test]
    fn test_record_assigns_increasing_sequence_ids() {
        let mut run = Run::new(Uuid::new_v4(), "brief text".to_string(), None);

        for _ in 0..3 {
            run.record(EventPayload::RunComplete { elapsed_ms: 0 });
        }

        let ids: Vec<u64> = run.events().iter().map(|e| e.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_stops_at_terminal_status() {
        let mut run = Run::new(Uuid::new_v4(), "brief text".to_string(), None);
        run.mark_started();
        run.set_status(PipelineStatus::Parsing);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(run.elapsed_ms(), 250);

        run.set_status(PipelineStatus::Complete);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(run.elapsed_ms(), 250);
        assert_eq!(run.snapshot().elapsed_ms, 250);
    }

    #[test]
    fn test_terminal_status_is_frozen() {
        let mut run = Run::new(Uuid::new_v4(), "brief text".to_string(), None);
        assert!(run.set_status(PipelineStatus::Parsing));
        assert!(run.set_status(PipelineStatus::Complete));

        assert!(!run.set_status(PipelineStatus::Researching));
        assert_eq!(run.status, PipelineStatus::Complete);

        let failure = StageFailure::new(FailedStage::Unknown, ErrorKind::Service, "late");
        run.fail(FailedStage::Unknown, failure);
        assert_eq!(run.status, PipelineStatus::Complete);
        assert!(run.error.is_none());
    }

    #[test]
    fn test_first_missing_attribution() {
        let mut outputs = StageOutputs::default();
        assert_eq!(outputs.first_missing(), FailedStage::Stage(Stage::BriefParse));

        outputs.brief = Some(sample_brief());
        assert_eq!(
            outputs.first_missing(),
            FailedStage::Stage(Stage::AudienceResearch)
        );
    }

    #[test]
    fn test_failed_stage_round_trip() {
        for stage in Stage::ALL {
            let parsed: FailedStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, FailedStage::Stage(stage));
        }
        assert_eq!(
            "creative_brief_or_performance_report".parse::<FailedStage>(),
            Ok(FailedStage::FanOut)
        );
        assert!("nope".parse::<FailedStage>().is_err());
    }

    #[test]
    fn test_admission_statuses() {
        assert!(PipelineStatus::Idle.admits_new_run());
        assert!(PipelineStatus::Complete.admits_new_run());
        assert!(PipelineStatus::Failed.admits_new_run());
        assert!(!PipelineStatus::Parsing.admits_new_run());
        assert!(!PipelineStatus::Reporting.admits_new_run());
    }

    #[test]
    fn test_input_hash_consistency() {
        assert_eq!(hash_input("test input"), hash_input("test input"));
        assert_ne!(hash_input("test input"), hash_input("different input"));
    }

    fn sample_brief() -> BriefParserOutput {
        BriefParserOutput {
            campaign_name: "Launch".into(),
            client_name: "Acme".into(),
            objectives: vec![],
            target_audience: "Adults".into(),
            budget: None,
            timeline: "4 weeks".into(),
            kpis: vec![],
            channels: vec![],
            key_messages: vec![],
            constraints: vec![],
            raw_summary: "Summary".into(),
            missing_fields: vec![],
        }
    }
}
