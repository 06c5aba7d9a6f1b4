//! TripPlan - progressive itinerary planner
//!
//! CLI entry point for streaming, replaying and inspecting trip plans.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tripplan::cli::{Cli, Command, OutputFormat, generate_after_help};
use tripplan::config::Config;
use tripplan::enrich::HttpEnricher;
use tripplan::events::{EventLogEntry, PlanEvent};
use tripplan::generator::{PlanGenerator, PlanRequest, ReplayGenerator, create_generator};
use tripplan::plan::{cost, dedup_key};
use tripplan::session::{PlanSession, SessionOptions, SessionSnapshot};
use tripplan::stream::FrameEncoder;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("tripplan.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(mode = ?config.plan.mode, "TripPlan loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Plan {
            request,
            destination,
            start_date,
            days,
            guests,
            format,
        }) => {
            debug!(%request, ?format, "main: matched Plan command");
            let request = build_request(request, destination, start_date, days, guests);
            cmd_plan(&config, request, format).await
        }
        Some(Command::Replay {
            file,
            chunk_size,
            delay_ms,
            format,
        }) => {
            debug!(file = %file.display(), chunk_size, "main: matched Replay command");
            cmd_replay(&config, &file, chunk_size, delay_ms, format).await
        }
        Some(Command::Record { document, token_chars }) => {
            debug!(document = %document.display(), token_chars, "main: matched Record command");
            cmd_record(&config, &document, token_chars)
        }
        Some(Command::Cost { text }) => {
            debug!(%text, "main: matched Cost command");
            cmd_cost(&text)
        }
        Some(Command::Key { title }) => {
            debug!(%title, "main: matched Key command");
            cmd_key(&title)
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        None => {
            debug!("main: no command specified, printing help");
            Cli::command().after_help(generate_after_help()).print_help()?;
            Ok(())
        }
    }
}

fn build_request(
    message: String,
    destination: Option<String>,
    start_date: Option<NaiveDate>,
    days: Option<u32>,
    guests: Option<u32>,
) -> PlanRequest {
    let mut request = PlanRequest::new(message);
    if let Some(destination) = destination {
        request = request.with_destination(destination);
    }
    if let Some(start_date) = start_date {
        request = request.with_start_date(start_date);
    }
    if let Some(days) = days {
        request = request.with_days(days);
    }
    if let Some(guests) = guests {
        request = request.with_guests(guests);
    }
    request
}

/// Session options from config, with the HTTP enricher attached when enabled
fn session_options(config: &Config) -> Result<SessionOptions> {
    let options = SessionOptions::from_config(config);
    if !config.enrichment.enabled {
        return Ok(options);
    }
    let enricher = HttpEnricher::from_config(&config.enrichment).context("Failed to create enricher")?;
    Ok(options.with_enricher(Arc::new(enricher)))
}

/// Stream a plan from the configured generator
async fn cmd_plan(config: &Config, request: PlanRequest, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_plan: called");
    let generator = create_generator(&config.generator).context("Failed to create plan generator")?;
    follow_turn(generator, session_options(config)?, request, format).await
}

/// Replay a transcript through a full session
async fn cmd_replay(
    config: &Config,
    file: &Path,
    chunk_size: usize,
    delay_ms: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    debug!(file = %file.display(), chunk_size, ?delay_ms, "cmd_replay: called");
    let encoder = FrameEncoder::from_config(&config.stream);
    let mut replay = ReplayGenerator::from_file(file, &encoder)
        .context(format!("Failed to read transcript {}", file.display()))?
        .with_chunk_size(chunk_size);
    if let Some(ms) = delay_ms {
        replay = replay.with_delay(Duration::from_millis(ms));
    }

    let request = PlanRequest::new(format!("replay of {}", file.display()));
    follow_turn(Arc::new(replay), session_options(config)?, request, format).await
}

/// Run one turn to completion and print it in the requested format
async fn follow_turn(
    generator: Arc<dyn PlanGenerator>,
    options: SessionOptions,
    request: PlanRequest,
    format: OutputFormat,
) -> Result<()> {
    let session = PlanSession::spawn(generator, options);
    let printer = spawn_printer(session.subscribe(), format);

    let result = session.run_turn(request).await;
    if let Err(e) = session.shutdown().await {
        debug!(error = %e, "follow_turn: session already stopped");
    }
    drop(session);
    if let Err(e) = printer.await {
        warn!(error = %e, "follow_turn: event printer panicked");
    }

    let snapshot = result.context("Plan session failed")?;
    match format {
        OutputFormat::Text => print_itinerary(&snapshot),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Events => {}
    }

    if snapshot.document.is_empty() {
        return Err(eyre::eyre!("No plan was produced"));
    }
    Ok(())
}

/// Print events as they arrive; ends once every sender is gone
fn spawn_printer(mut rx: broadcast::Receiver<PlanEvent>, format: OutputFormat) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "spawn_printer: lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match format {
                OutputFormat::Events => match serde_json::to_string(&EventLogEntry::new(event)) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "spawn_printer: failed to serialize event"),
                },
                OutputFormat::Text => print_progress(&event),
                OutputFormat::Json => {}
            }
        }
    })
}

fn print_progress(event: &PlanEvent) {
    match event {
        PlanEvent::ItemsMerged { added, total_items, .. } => {
            eprintln!("{}", format!("  +{} items ({} so far)", added, total_items).dimmed());
        }
        PlanEvent::FinalizeFailed { error, .. } => {
            eprintln!("{} {}", "Final plan unusable, keeping streamed items:".yellow(), error);
        }
        PlanEvent::TurnFailed { error, .. } => {
            eprintln!("{} {}", "Stream failed:".red(), error);
        }
        PlanEvent::Finalized { report, .. } if report.backfilled > 0 || !report.underfilled.is_empty() => {
            eprintln!(
                "{}",
                format!(
                    "  {} items backfilled, {} days short",
                    report.backfilled,
                    report.underfilled.len()
                )
                .dimmed()
            );
        }
        _ => {}
    }
}

fn print_itinerary(snapshot: &SessionSnapshot) {
    if let Some(reply) = &snapshot.reply_text {
        println!("{}\n", reply);
    }

    for (index, day) in snapshot.document.days().iter().enumerate() {
        let date = snapshot
            .request
            .as_ref()
            .and_then(|request| request.date_of_day(index))
            .map(|date| format!(" ({})", date.format("%a %b %-d")))
            .unwrap_or_default();
        println!("{}", format!("Day {}{}", index + 1, date).bold());

        for item in day {
            let cost = item
                .estimated_cost
                .as_deref()
                .map(|c| format!("  {}", c.green()))
                .unwrap_or_default();
            println!("  - {}{}", item.title.cyan(), cost);
            println!("    {}", item.short_description.dimmed());
            if let Some(address) = &item.metadata.address {
                println!("    {}", address.dimmed());
            }
        }
        println!();
    }

    let status = if snapshot.finalized {
        "final".green()
    } else {
        "partial".yellow()
    };
    println!(
        "{} days, {} items ({})",
        snapshot.document.len(),
        snapshot.document.total_items(),
        status
    );
}

/// Print the transcript a generator would stream for a final document
fn cmd_record(config: &Config, document: &Path, token_chars: usize) -> Result<()> {
    debug!(document = %document.display(), token_chars, "cmd_record: called");
    let content = fs::read_to_string(document).context(format!("Failed to read {}", document.display()))?;
    serde_json::from_str::<serde_json::Value>(&content).context("Document is not valid JSON")?;

    let encoder = FrameEncoder::from_config(&config.stream);
    print!("{}", encoder.transcript(content.trim(), token_chars));
    Ok(())
}

fn cmd_cost(text: &str) -> Result<()> {
    debug!(%text, "cmd_cost: called");
    match cost::normalize(Some(text)) {
        Some(normalized) => println!("{}", normalized),
        None => println!("{}", "(no cost)".dimmed()),
    }
    Ok(())
}

fn cmd_key(title: &str) -> Result<()> {
    debug!(%title, "cmd_key: called");
    println!("{}", dedup_key(title));
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
