//! TripCraft - budget-aware trip planner
//!
//! CLI entry point for planning trips with the offline estimate stages.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use tripcraft::cli::{Cli, Command, OutputFormat};
use tripcraft::config::Config;
use tripcraft::domain::{ModificationAction, Plan, StageName, TripRequest, format_amount};
use tripcraft::events::{EventLogEntry, TripEvent, create_event_bus};
use tripcraft::pipeline::{BudgetAllocationStrategy, DependencyGraph, EstimateStage, RunMetadata};
use tripcraft::session::{QueueOutcome, SessionStore};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripcraft")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("tripcraft.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Allocate { budget, format } => cmd_allocate(&config, budget, format),
        Command::Graph { format } => cmd_graph(format),
        Command::Plan {
            request,
            changes,
            events,
            format,
        } => cmd_plan(&config, &request, changes.as_deref(), events.as_deref(), format).await,
    }
}

/// Print the budget split for a total
fn cmd_allocate(config: &Config, budget: f64, format: OutputFormat) -> Result<()> {
    let strategy = BudgetAllocationStrategy::new(config.budget.clone()).context("Invalid budget shares")?;
    let allocation = strategy.allocate(budget).context("Failed to allocate budget")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&allocation)?);
        }
        OutputFormat::Text => {
            println!("{}", allocation.summary());
        }
    }
    Ok(())
}

/// Print the stage order and what each stage waits for
fn cmd_graph(format: OutputFormat) -> Result<()> {
    let graph = DependencyGraph::standard();

    match format {
        OutputFormat::Json => {
            let stages: Vec<_> = graph
                .execution_order()
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "stage": s,
                        "ordinal": graph.ordinal(*s),
                        "prerequisites": graph.prerequisites(*s),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&stages)?);
        }
        OutputFormat::Text => {
            println!("{}", "Stage order".bold());
            for (idx, stage) in graph.execution_order().iter().enumerate() {
                let prerequisites = graph.prerequisites(*stage);
                if prerequisites.is_empty() {
                    println!("  {}. {}", idx + 1, stage);
                } else {
                    let names: Vec<&str> = prerequisites.iter().map(|p| p.as_str()).collect();
                    println!("  {}. {} {}", idx + 1, stage, format!("(after {})", names.join(", ")).dimmed());
                }
            }
        }
    }
    Ok(())
}

/// Plan a trip, then queue and apply the requested changes as one batch
async fn cmd_plan(
    config: &Config,
    request_path: &Path,
    changes_path: Option<&Path>,
    events_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let request = read_yaml::<TripRequest>(request_path).context("Failed to load trip request")?;
    let changes = match changes_path {
        Some(path) => read_yaml::<Vec<ModificationAction>>(path).context("Failed to load changes")?,
        None => Vec::new(),
    };

    let planner = config.planner(EstimateStage::stage_set())?;
    let bus = create_event_bus(config.sessions.event_capacity);
    let mut events_rx = bus.subscribe();
    let store = SessionStore::spawn(planner, Arc::clone(&bus));
    let session = store.create().await?;
    info!(session_id = %session.id(), destination = %request.destination, "Planning trip");

    let result = session.run_pipeline(request).await;

    let mut queued = Vec::new();
    let mut applied = None;
    if let Ok((plan, metadata)) = &result {
        if format == OutputFormat::Text {
            print_run(plan, metadata);
        }

        for action in changes {
            let outcome = session.queue_modification(action).await?;
            if format == OutputFormat::Text {
                print_queue_outcome(&outcome);
            }
            queued.push(outcome);
        }

        if queued.iter().any(|q| q.accepted) {
            let outcome = session.apply_all().await?;
            if format == OutputFormat::Text {
                println!();
                println!("{} re-ran {}", "Applied:".green().bold(), join_stages(&outcome.stages));
                for result in &outcome.results {
                    for warning in &result.warnings {
                        println!("  {} {}", "warning:".yellow(), warning);
                    }
                }
                println!();
                print_plan(&outcome.plan);
            }
            applied = Some(outcome);
        }
    }

    if let Some(path) = events_path {
        write_events(path, &mut events_rx)?;
    }

    let (plan, metadata) = match result {
        Ok(ok) => ok,
        Err(e) => {
            eprintln!("{} {}", "Planning failed:".red().bold(), e);
            store.shutdown().await?;
            return Err(e).context("Pipeline run failed");
        }
    };

    match format {
        OutputFormat::Json => {
            let final_plan = applied.as_ref().map(|a| &a.plan).unwrap_or(&plan);
            let history = session.history_summary().await;
            let output = serde_json::json!({
                "session": session.id(),
                "allocation": metadata.allocation,
                "progress": metadata.progress.messages(),
                "modifications": queued,
                "applied": applied.as_ref().map(|a| &a.results),
                "history": history,
                "plan": final_plan,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!();
            println!("{}", "History".bold());
            for line in session.history_summary().await {
                println!("  {}", line);
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

/// Drain buffered session events into a JSON lines file
fn write_events(path: &Path, rx: &mut tokio::sync::broadcast::Receiver<TripEvent>) -> Result<()> {
    let mut file = fs::File::create(path).context(format!("Failed to create {}", path.display()))?;
    loop {
        match rx.try_recv() {
            Ok(event) => {
                let line = serde_json::to_string(&EventLogEntry::new(event))?;
                writeln!(file, "{}", line)?;
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagged, oldest events dropped");
            }
            Err(_) => break,
        }
    }
    Ok(())
}

fn join_stages(stages: &[StageName]) -> String {
    stages.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> ")
}

fn print_run(plan: &Plan, metadata: &RunMetadata) {
    println!("{}", metadata.allocation.summary());
    println!();
    for message in metadata.progress.messages() {
        println!("{}", message.dimmed());
    }
    println!();
    print_plan(plan);
}

fn print_plan(plan: &Plan) {
    println!(
        "{} {} ({} to {}, {} traveler(s), {})",
        "Plan:".bold(),
        plan.request.destination,
        plan.request.start_date,
        plan.request.end_date,
        plan.request.travelers,
        format_amount(plan.request.budget)
    );
    for (stage, output) in plan.outputs() {
        let confidence = format!("{:.0}%", output.confidence * 100.0);
        let confidence = if output.is_degraded() {
            confidence.red()
        } else {
            confidence.normal()
        };
        let cost = output
            .number("estimated_cost")
            .map(|c| format!("  {}", format_amount(c)))
            .unwrap_or_default();
        println!("  {:<13} {:>5}  {}{}", stage.as_str(), confidence, output.data_source, cost);
    }
    println!("  Overall confidence: {:.0}%", plan.overall_confidence * 100.0);
    for warning in &plan.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}

fn print_queue_outcome(outcome: &QueueOutcome) {
    match &outcome.modification {
        Some(modification) => {
            println!(
                "{} {} ({} pending)",
                "Queued:".green(),
                modification.description,
                outcome.pending_count
            );
        }
        None => {
            println!("{}", "Rejected:".red().bold());
        }
    }
    for conflict in &outcome.conflicts {
        println!("  {}", conflict);
        for suggestion in &conflict.suggestions {
            println!("    - {}", suggestion);
        }
    }
}
