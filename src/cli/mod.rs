//! Command-line interface for agencyflow.
//!
//! Provides commands for running the campaign pipeline on a brief,
//! checking the generation service, and inspecting configuration and
//! the metrics dataset.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{GeminiClient, GenerationClient};
use crate::config::{self, ResolvedConfig};
use crate::core::{Orchestrator, RateLimiter, ResilientCaller};
use crate::domain::{Event, EventPayload, PerformanceInput, PipelineStatus};
use crate::ingest;

/// agencyflow - Multi-stage campaign planning pipeline
#[derive(Parser, Debug)]
#[command(name = "agencyflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline on a campaign brief
    Run {
        /// Brief file (.txt or .md)
        #[arg(short, long, conflicts_with_all = ["text", "stdin"])]
        input: Option<PathBuf>,

        /// Brief text given directly
        #[arg(short, long, conflicts_with = "stdin")]
        text: Option<String>,

        /// Read the brief from stdin
        #[arg(long)]
        stdin: bool,

        /// Print events as JSON lines instead of progress text
        #[arg(long)]
        json: bool,
    },

    /// Check that the generation service is reachable
    Health,

    /// Show resolved configuration
    Config,

    /// Show the metrics dataset used by the performance report
    Metrics,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                input,
                text,
                stdin,
                json,
            } => run_pipeline(input, text, stdin, json).await,
            Commands::Health => check_health().await,
            Commands::Config => show_config(),
            Commands::Metrics => show_metrics(),
        }
    }
}

/// Load the metrics dataset from the configured path, or the bundled sample
fn load_metrics(cfg: &ResolvedConfig) -> Result<PerformanceInput> {
    match cfg.metrics_path {
        Some(ref path) => PerformanceInput::from_file(path),
        None => PerformanceInput::bundled(),
    }
}

fn build_client(cfg: &ResolvedConfig) -> Result<GeminiClient> {
    let api_key = cfg.gemini.require_api_key()?;
    GeminiClient::new(
        api_key,
        cfg.gemini.model.clone(),
        cfg.gemini.base_url.clone(),
        cfg.gemini.request_timeout,
    )
    .context("Failed to create Gemini client")
}

fn build_orchestrator(cfg: &ResolvedConfig) -> Result<Orchestrator> {
    let client: Arc<dyn GenerationClient> = Arc::new(build_client(cfg)?);
    let limiter = Arc::new(RateLimiter::new(cfg.requests_per_minute));
    let caller = ResilientCaller::new(client, limiter, cfg.retry.clone());
    Ok(Orchestrator::new(caller, load_metrics(cfg)?))
}

/// Resolve brief text and source name from the command-line options
async fn read_input(
    cfg: &ResolvedConfig,
    input_file: Option<PathBuf>,
    text: Option<String>,
    use_stdin: bool,
) -> Result<(String, Option<String>)> {
    if let Some(path) = input_file {
        let source = ingest::read_brief(&path, &cfg.limits).await?;
        return Ok((source.text, Some(source.source_name)));
    }

    let text = if let Some(text) = text {
        text
    } else if use_stdin || !io::stdin().is_terminal() {
        // Read from stdin if --stdin flag or if stdin is piped
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No brief provided. Use --input <file>, --text <brief> or pipe to stdin");
    };

    cfg.limits.validate_input(&text, None)?;
    Ok((text, None))
}

/// One progress line for an event
fn describe(event: &Event) -> String {
    match &event.payload {
        EventPayload::StageStatus {
            stage, elapsed_ms, ..
        } => format!("[{:>3}] {} started (+{}ms)", event.sequence_id, stage.label(), elapsed_ms),
        EventPayload::StageComplete { stage, .. } => {
            format!("[{:>3}] {} complete", event.sequence_id, stage.label())
        }
        EventPayload::BranchStatus {
            stage,
            status,
            output,
        } => match (status, output) {
            (PipelineStatus::Complete, Some(_)) => {
                format!("[{:>3}] {} complete", event.sequence_id, stage.label())
            }
            _ => format!("[{:>3}] {} started ({})", event.sequence_id, stage.label(), status),
        },
        EventPayload::RunFailed {
            failed_stage,
            error,
        } => format!(
            "[{:>3}] Run failed at {}: {}{}",
            event.sequence_id,
            failed_stage,
            error.message,
            if error.retryable { " (retryable)" } else { "" }
        ),
        EventPayload::RunComplete { elapsed_ms } => {
            format!("[{:>3}] Run complete in {}ms", event.sequence_id, elapsed_ms)
        }
    }
}

/// Run the pipeline and follow its event stream to the end
async fn run_pipeline(
    input_file: Option<PathBuf>,
    text: Option<String>,
    use_stdin: bool,
    json: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let (brief, source_name) = read_input(cfg, input_file, text, use_stdin).await?;
    let orchestrator = build_orchestrator(cfg)?;

    let ticket = orchestrator.start_run(brief, source_name).await?;
    let mut stream = orchestrator.events(ticket.run_id).await?;
    eprintln!("[Run {} started]", ticket.run_id);

    while let Some(event) = stream.next().await? {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            eprintln!("{}", describe(&event));
        }
    }

    let snapshot = orchestrator
        .get_run(ticket.run_id)
        .await
        .with_context(|| format!("Run {} is no longer tracked", ticket.run_id))?;

    match snapshot.status {
        PipelineStatus::Complete => {
            if !json {
                println!("{}", serde_json::to_string_pretty(&snapshot.outputs)?);
            }
            eprintln!("\n[Run {} completed successfully]", snapshot.id);
            Ok(())
        }
        PipelineStatus::Failed => {
            let reason = snapshot
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!("\n[Run {} failed: {}]", snapshot.id, reason);
            std::process::exit(1);
        }
        status => {
            eprintln!("\n[Run {} in state: {}]", snapshot.id, status);
            std::process::exit(1);
        }
    }
}

async fn check_health() -> Result<()> {
    let cfg = config::config()?;
    let client = build_client(cfg)?;

    match client.health_check().await {
        Ok(()) => {
            println!("{} ({}): ok", client.name(), cfg.gemini.model);
            Ok(())
        }
        Err(e) => anyhow::bail!("{} ({}) unreachable: {}", client.name(), cfg.gemini.model, e),
    }
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("agencyflow configuration");
    println!();
    println!("{}", cfg);
    println!();
    println!("Input limits:");
    println!(
        "  Brief length:   {}..={} chars",
        cfg.limits.min_brief_chars, cfg.limits.max_brief_chars
    );
    println!("  Denylist:       {}", cfg.limits.denylist_patterns.join(", "));

    Ok(())
}

fn show_metrics() -> Result<()> {
    let cfg = config::config()?;
    let metrics = load_metrics(cfg)?;

    println!("Campaign: {}", metrics.campaign_name);
    println!("Period:   {}", metrics.reporting_period);
    println!();
    println!(
        "{:<12} {:>12} {:>12} {:>8} {:>10} {:>12} {:>12}",
        "CHANNEL", "IMPRESSIONS", "REACH", "ENG %", "CLICKS", "CONVERSIONS", "SPEND"
    );
    println!("{}", "-".repeat(84));
    for m in &metrics.channel_metrics {
        println!(
            "{:<12} {:>12} {:>12} {:>8.2} {:>10} {:>12} {:>12.2}",
            m.channel, m.impressions, m.reach, m.engagement_rate, m.clicks, m.conversions, m.spend
        );
    }
    println!();
    println!("Total spend: {:.2}", metrics.total_spend());
    if !metrics.goals.is_empty() {
        println!("Goals:");
        for goal in &metrics.goals {
            println!("  - {}", goal);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, FailedStage, Stage, StageFailure};
    use uuid::Uuid;

    #[test]
    fn test_cli_parses_run_options() {
        let cli =
            Cli::try_parse_from(["agencyflow", "run", "--input", "brief.md", "--json"]).unwrap();
        match cli.command {
            Commands::Run { input, json, .. } => {
                assert_eq!(input, Some(PathBuf::from("brief.md")));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_conflicting_inputs() {
        let parsed =
            Cli::try_parse_from(["agencyflow", "run", "--input", "a.md", "--text", "brief"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_describe_failure() {
        let failure = StageFailure::new(
            FailedStage::Stage(Stage::AudienceResearch),
            ErrorKind::RetriesExhausted,
            "quota",
        );
        let event = Event::new(
            7,
            Uuid::new_v4(),
            EventPayload::RunFailed {
                failed_stage: failure.stage,
                error: failure,
            },
        );

        assert_eq!(
            describe(&event),
            "[  7] Run failed at audience_research: quota (retryable)"
        );
    }

    #[test]
    fn test_describe_branch_start() {
        let event = Event::new(
            9,
            Uuid::new_v4(),
            EventPayload::BranchStatus {
                stage: Stage::PerformanceReport,
                status: PipelineStatus::Reporting,
                output: None,
            },
        );
        assert_eq!(describe(&event), "[  9] Performance Report started (reporting)");
    }
}
