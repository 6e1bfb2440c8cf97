//! Main orchestrator for campaign runs.
//!
//! Admits at most one active run, drives it through the task graph on a
//! background task, and publishes every status change to the run's event
//! log. Failures are caught once, at the top of the run task, and
//! attributed to the first stage whose output slot is still empty.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    AudienceOutput, BriefParserInput, BriefParserOutput, CalendarOutput, CalendarSummary,
    CreativeBriefInput, CreativeBriefOutput, ErrorKind, EventPayload, PerformanceInput,
    PerformanceOutput, PipelineStatus, Run, RunSnapshot, Stage, StageFailure, StageOutputs,
};
use crate::tasks::{self, TaskError};

use super::caller::ResilientCaller;
use super::event_log::{EventLog, EventStream};
use super::graph::{self, StageDescriptor};

/// Errors returned to callers of the orchestrator
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("Pipeline already running (run {run_id}, status {status})")]
    AlreadyRunning {
        run_id: Uuid,
        status: PipelineStatus,
    },

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Event stream for run {0} has already been claimed")]
    StreamClaimed(Uuid),
}

/// Returned on admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunTicket {
    pub run_id: Uuid,
    pub status: PipelineStatus,
}

/// Shared state for one run
#[derive(Debug)]
struct RunHandle {
    id: Uuid,
    run: RwLock<Run>,
    log: EventLog,
    stream: Mutex<Option<EventStream>>,
}

impl RunHandle {
    fn new(run: Run, log: EventLog, stream: EventStream) -> Self {
        Self {
            id: run.id,
            run: RwLock::new(run),
            log,
            stream: Mutex::new(Some(stream)),
        }
    }

    async fn status(&self) -> PipelineStatus {
        self.run.read().await.status
    }

    /// Record and publish under the run lock, so channel order matches
    /// sequence order
    async fn publish(&self, payload: EventPayload) {
        let mut run = self.run.write().await;
        let event = run.record(payload);
        self.log.publish(event);
    }

    async fn enter(&self, descriptor: &StageDescriptor) {
        let mut run = self.run.write().await;
        run.set_status(descriptor.status);
        let elapsed_ms = run.elapsed_ms();
        let event = run.record(EventPayload::StageStatus {
            stage: descriptor.stage,
            status: descriptor.status,
            elapsed_ms,
        });
        self.log.publish(event);
        info!(run_id = %self.id, stage = %descriptor.stage, "Stage started");
    }

    async fn inputs(&self, metrics: &Arc<PerformanceInput>) -> StageInputs {
        let run = self.run.read().await;
        StageInputs {
            raw_text: run.input.clone(),
            source_name: run.source_name.clone(),
            outputs: run.outputs.clone(),
            metrics: Arc::clone(metrics),
        }
    }

    /// Store a stage's document and publish its completion
    async fn store(&self, document: StageDocument) {
        let stage = document.stage();
        let output = document.to_json();
        let mut run = self.run.write().await;
        document.store(&mut run.outputs);

        let payload = match graph::descriptor(stage).phase {
            graph::Phase::FanOutSecondary => EventPayload::BranchStatus {
                stage,
                status: PipelineStatus::Complete,
                output: Some(output),
            },
            _ => EventPayload::StageComplete { stage, output },
        };
        let event = run.record(payload);
        self.log.publish(event);
        info!(run_id = %self.id, %stage, elapsed_ms = run.elapsed_ms(), "Stage completed");
    }

    async fn complete(&self) {
        let mut run = self.run.write().await;
        run.set_status(PipelineStatus::Complete);
        let elapsed_ms = run.elapsed_ms();
        let event = run.record(EventPayload::RunComplete { elapsed_ms });
        self.log.publish(event);
        info!(run_id = %self.id, elapsed_ms, "Run completed successfully");
    }

    async fn fail(&self, kind: ErrorKind, message: &str) {
        let mut run = self.run.write().await;
        let failed_stage = run.outputs.first_missing();
        let failure = StageFailure::new(failed_stage, kind, message);
        run.fail(failed_stage, failure.clone());

        error!(
            run_id = %self.id,
            %failed_stage,
            ?kind,
            retryable = failure.retryable,
            error = %failure.message,
            "Run failed"
        );

        let event = run.record(EventPayload::RunFailed {
            failed_stage,
            error: failure,
        });
        self.log.publish(event);
    }
}

/// Everything a stage may read, copied out of the run
#[derive(Debug, Clone)]
struct StageInputs {
    raw_text: String,
    source_name: Option<String>,
    outputs: StageOutputs,
    metrics: Arc<PerformanceInput>,
}

/// A dependency's output slot; the graph has already checked it is filled
fn slot<T>(slot: &Option<T>, stage: Stage, dependency: Stage) -> Result<&T, TaskError> {
    slot.as_ref()
        .ok_or(TaskError::MissingDependency { stage, dependency })
}

/// A stage's validated output
#[derive(Debug)]
enum StageDocument {
    Brief(BriefParserOutput),
    Audience(AudienceOutput),
    Calendar(CalendarOutput),
    CreativeBrief(CreativeBriefOutput),
    Performance(PerformanceOutput),
}

impl StageDocument {
    fn stage(&self) -> Stage {
        match self {
            Self::Brief(_) => Stage::BriefParse,
            Self::Audience(_) => Stage::AudienceResearch,
            Self::Calendar(_) => Stage::ContentCalendar,
            Self::CreativeBrief(_) => Stage::CreativeBrief,
            Self::Performance(_) => Stage::PerformanceReport,
        }
    }

    fn to_json(&self) -> Value {
        let value = match self {
            Self::Brief(d) => serde_json::to_value(d),
            Self::Audience(d) => serde_json::to_value(d),
            Self::Calendar(d) => serde_json::to_value(d),
            Self::CreativeBrief(d) => serde_json::to_value(d),
            Self::Performance(d) => serde_json::to_value(d),
        };
        value.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize stage output for event");
            Value::Null
        })
    }

    fn store(self, outputs: &mut StageOutputs) {
        match self {
            Self::Brief(d) => outputs.brief = Some(d),
            Self::Audience(d) => outputs.audience = Some(d),
            Self::Calendar(d) => outputs.calendar = Some(d),
            Self::CreativeBrief(d) => outputs.creative_brief = Some(d),
            Self::Performance(d) => outputs.performance = Some(d),
        }
    }
}

/// A stage with its inputs resolved
#[derive(Debug)]
enum PreparedStage<'a> {
    Brief(BriefParserInput),
    Audience(&'a BriefParserOutput),
    Calendar(&'a BriefParserOutput, &'a AudienceOutput),
    CreativeBrief(CreativeBriefInput),
    Performance(&'a PerformanceInput),
}

/// Resolve a stage's inputs.
///
/// Dependencies come from the task graph: any declared dependency whose
/// slot is empty fails here, before any request is made.
fn prepare(stage: Stage, inputs: &StageInputs) -> Result<PreparedStage<'_>, TaskError> {
    let outputs = &inputs.outputs;

    if let Some(&dependency) = graph::descriptor(stage)
        .depends_on
        .iter()
        .find(|dep| !outputs.is_filled(**dep))
    {
        return Err(TaskError::MissingDependency { stage, dependency });
    }

    let prepared = match stage {
        Stage::BriefParse => {
            let input = BriefParserInput::new(&inputs.raw_text, inputs.source_name.as_deref())
                .map_err(|source| TaskError::InvalidInput {
                    task: "brief_parser",
                    source,
                })?;
            PreparedStage::Brief(input)
        }
        Stage::AudienceResearch => {
            PreparedStage::Audience(slot(&outputs.brief, stage, Stage::BriefParse)?)
        }
        Stage::ContentCalendar => PreparedStage::Calendar(
            slot(&outputs.brief, stage, Stage::BriefParse)?,
            slot(&outputs.audience, stage, Stage::AudienceResearch)?,
        ),
        Stage::CreativeBrief => {
            let brief = slot(&outputs.brief, stage, Stage::BriefParse)?;
            let audience = slot(&outputs.audience, stage, Stage::AudienceResearch)?;
            let calendar = slot(&outputs.calendar, stage, Stage::ContentCalendar)?;

            // Summary only; the entry list would dominate the request
            PreparedStage::CreativeBrief(CreativeBriefInput {
                brief_data: brief.clone(),
                audience_data: audience.clone(),
                calendar_summary: CalendarSummary::from(calendar),
            })
        }
        Stage::PerformanceReport => PreparedStage::Performance(inputs.metrics.as_ref()),
    };
    Ok(prepared)
}

/// Run one stage against the outputs gathered so far
async fn execute_stage(
    caller: &ResilientCaller,
    stage: Stage,
    inputs: &StageInputs,
) -> Result<StageDocument, TaskError> {
    match prepare(stage, inputs)? {
        PreparedStage::Brief(input) => tasks::parse_brief(&input, caller)
            .await
            .map(StageDocument::Brief),
        PreparedStage::Audience(brief) => tasks::research_audience(brief, caller)
            .await
            .map(StageDocument::Audience),
        PreparedStage::Calendar(brief, audience) => {
            tasks::generate_calendar(brief, audience, caller)
                .await
                .map(StageDocument::Calendar)
        }
        PreparedStage::CreativeBrief(input) => tasks::generate_creative_brief(&input, caller)
            .await
            .map(StageDocument::CreativeBrief),
        PreparedStage::Performance(metrics) => tasks::generate_report(metrics, caller)
            .await
            .map(StageDocument::Performance),
    }
}

/// Drives a single run from admission to a terminal status
struct RunDriver {
    handle: Arc<RunHandle>,
    caller: ResilientCaller,
    metrics: Arc<PerformanceInput>,
}

impl RunDriver {
    /// Execute the run and always finish it: terminal event, then end marker
    async fn run(self) {
        let handle = Arc::clone(&self.handle);
        handle.run.write().await.mark_started();

        match tokio::spawn(self.execute()).await {
            Ok(Ok(())) => handle.complete().await,
            Ok(Err(e)) => handle.fail(e.kind(), &e.to_string()).await,
            Err(join_error) => {
                handle
                    .fail(
                        ErrorKind::Internal,
                        &format!("Run task aborted: {}", join_error),
                    )
                    .await
            }
        }

        handle.log.close();
        debug!(run_id = %handle.id, "Event log closed");
    }

    async fn execute(self) -> Result<(), TaskError> {
        for descriptor in graph::sequential() {
            self.handle.enter(descriptor).await;
            let inputs = self.handle.inputs(&self.metrics).await;
            let document = execute_stage(&self.caller, descriptor.stage, &inputs).await?;
            self.handle.store(document).await;
        }

        self.fan_out().await
    }

    /// Run the fan-out pair concurrently; keep both outputs or neither
    async fn fan_out(&self) -> Result<(), TaskError> {
        let (primary, secondary) = graph::fan_out();

        self.handle.enter(primary).await;
        self.handle
            .publish(EventPayload::BranchStatus {
                stage: secondary.stage,
                status: secondary.status,
                output: None,
            })
            .await;

        let inputs = self.handle.inputs(&self.metrics).await;
        let (primary_result, secondary_result) = tokio::join!(
            execute_stage(&self.caller, primary.stage, &inputs),
            execute_stage(&self.caller, secondary.stage, &inputs)
        );

        // The primary branch's error is reported when both fail
        let primary_document = primary_result?;
        let secondary_document = secondary_result?;

        self.handle.store(primary_document).await;
        self.handle.store(secondary_document).await;
        Ok(())
    }
}

/// Main campaign orchestrator.
///
/// Cheap to clone; clones share the admission region and the caller.
#[derive(Clone)]
pub struct Orchestrator {
    caller: ResilientCaller,
    metrics: Arc<PerformanceInput>,
    /// The tracked run. A new admission replaces it.
    current: Arc<Mutex<Option<Arc<RunHandle>>>>,
}

impl Orchestrator {
    pub fn new(caller: ResilientCaller, metrics: PerformanceInput) -> Self {
        Self {
            caller,
            metrics: Arc::new(metrics),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Admit a new run and start it in the background.
    ///
    /// Rejected while the tracked run is neither idle nor terminal. The
    /// check and the status change happen inside one critical section.
    #[instrument(skip(self, raw_text), fields(source = source_name.as_deref().unwrap_or("-")))]
    pub async fn start_run(
        &self,
        raw_text: String,
        source_name: Option<String>,
    ) -> Result<RunTicket, OrchestratorError> {
        let mut current = self.current.lock().await;

        if let Some(existing) = current.as_ref() {
            let status = existing.status().await;
            if !status.admits_new_run() {
                warn!(run_id = %existing.id, %status, "Rejecting run: pipeline already running");
                return Err(OrchestratorError::AlreadyRunning {
                    run_id: existing.id,
                    status,
                });
            }
        }

        let run_id = Uuid::new_v4();
        let mut run = Run::new(run_id, raw_text, source_name);
        run.set_status(PipelineStatus::Parsing);
        info!(%run_id, input_digest = %run.input_digest, "Starting pipeline run");

        let (log, stream) = EventLog::channel(run_id);
        let handle = Arc::new(RunHandle::new(run, log, stream));
        *current = Some(Arc::clone(&handle));
        drop(current);

        let driver = RunDriver {
            handle,
            caller: self.caller.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        tokio::spawn(driver.run());

        Ok(RunTicket {
            run_id,
            status: PipelineStatus::Parsing,
        })
    }

    async fn handle(&self, run_id: Uuid) -> Result<Arc<RunHandle>, OrchestratorError> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|h| h.id == run_id)
            .cloned()
            .ok_or(OrchestratorError::RunNotFound(run_id))
    }

    /// Snapshot of a run, if it is still tracked
    pub async fn get_run(&self, run_id: Uuid) -> Option<RunSnapshot> {
        let handle = self.handle(run_id).await.ok()?;
        let snapshot = handle.run.read().await.snapshot();
        Some(snapshot)
    }

    /// Snapshot of the tracked run, whatever its id
    pub async fn current_run(&self) -> Option<RunSnapshot> {
        let handle = self.current.lock().await.as_ref().cloned()?;
        let snapshot = handle.run.read().await.snapshot();
        Some(snapshot)
    }

    /// Claim the live event stream of a run. Each run has exactly one.
    pub async fn events(&self, run_id: Uuid) -> Result<EventStream, OrchestratorError> {
        let handle = self.handle(run_id).await?;
        let stream = handle.stream.lock().await.take();
        stream.ok_or(OrchestratorError::StreamClaimed(run_id))
    }
}
