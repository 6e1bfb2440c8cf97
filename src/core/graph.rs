//! Static task graph for the campaign pipeline.
//!
//! Three stages run in sequence, then two run concurrently and are joined
//! as a unit:
//!
//! ```text
//! brief_parse -> audience_research -> content_calendar -+-> creative_brief
//!                                                       +-> performance_report
//! ```
//!
//! Performance reporting consumes the metrics dataset only, so it has no
//! dependency on the sequential chain; it is still scheduled after it so
//! the run has a single join point.

use anyhow::Result;

use crate::domain::{PipelineStatus, Stage};

/// Where a stage is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs alone, after every earlier sequential stage
    Sequential,
    /// Reported through the run status while the fan-out is in flight
    FanOutPrimary,
    /// Runs beside the primary; progress is reported via branch events
    FanOutSecondary,
}

/// One node of the graph
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub stage: Stage,

    /// Status the run (or branch) takes while this stage is in flight
    pub status: PipelineStatus,

    /// Stages whose outputs this stage reads
    pub depends_on: &'static [Stage],

    pub phase: Phase,
}

pub static TASK_GRAPH: [StageDescriptor; 5] = [
    StageDescriptor {
        stage: Stage::BriefParse,
        status: PipelineStatus::Parsing,
        depends_on: &[],
        phase: Phase::Sequential,
    },
    StageDescriptor {
        stage: Stage::AudienceResearch,
        status: PipelineStatus::Researching,
        depends_on: &[Stage::BriefParse],
        phase: Phase::Sequential,
    },
    StageDescriptor {
        stage: Stage::ContentCalendar,
        status: PipelineStatus::Calendaring,
        depends_on: &[Stage::BriefParse, Stage::AudienceResearch],
        phase: Phase::Sequential,
    },
    StageDescriptor {
        stage: Stage::CreativeBrief,
        status: PipelineStatus::Briefing,
        depends_on: &[
            Stage::BriefParse,
            Stage::AudienceResearch,
            Stage::ContentCalendar,
        ],
        phase: Phase::FanOutPrimary,
    },
    StageDescriptor {
        stage: Stage::PerformanceReport,
        status: PipelineStatus::Reporting,
        depends_on: &[],
        phase: Phase::FanOutSecondary,
    },
];

/// Look up a stage's descriptor
pub fn descriptor(stage: Stage) -> &'static StageDescriptor {
    match stage {
        Stage::BriefParse => &TASK_GRAPH[0],
        Stage::AudienceResearch => &TASK_GRAPH[1],
        Stage::ContentCalendar => &TASK_GRAPH[2],
        Stage::CreativeBrief => &TASK_GRAPH[3],
        Stage::PerformanceReport => &TASK_GRAPH[4],
    }
}

/// Sequential stages in execution order
pub fn sequential() -> impl Iterator<Item = &'static StageDescriptor> {
    TASK_GRAPH.iter().filter(|d| d.phase == Phase::Sequential)
}

/// The fan-out pair as (primary, secondary)
pub fn fan_out() -> (&'static StageDescriptor, &'static StageDescriptor) {
    (
        descriptor(Stage::CreativeBrief),
        descriptor(Stage::PerformanceReport),
    )
}

/// Check that every dependency is scheduled strictly before its dependent
/// and that the fan-out branches do not depend on each other.
pub fn validate() -> Result<()> {
    for (i, node) in TASK_GRAPH.iter().enumerate() {
        for dep in node.depends_on {
            let position = TASK_GRAPH.iter().position(|d| d.stage == *dep);
            match position {
                Some(idx) if idx >= i => {
                    anyhow::bail!(
                        "Stage '{}' depends on later stage '{}' (forward references not allowed)",
                        node.stage,
                        dep
                    );
                }
                Some(idx) if TASK_GRAPH[idx].phase != Phase::Sequential => {
                    anyhow::bail!(
                        "Stage '{}' depends on fan-out stage '{}'",
                        node.stage,
                        dep
                    );
                }
                None => {
                    anyhow::bail!("Stage '{}' depends on unknown stage '{}'", node.stage, dep);
                }
                _ => {}
            }
        }
    }

    let first_fan_out = TASK_GRAPH
        .iter()
        .position(|d| d.phase != Phase::Sequential)
        .unwrap_or(TASK_GRAPH.len());
    if TASK_GRAPH[first_fan_out..]
        .iter()
        .any(|d| d.phase == Phase::Sequential)
    {
        anyhow::bail!("Sequential stages must precede the fan-out");
    }

    Ok(())
}
