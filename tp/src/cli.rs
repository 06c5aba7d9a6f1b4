//! CLI command definitions and subcommands

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::generator::DEFAULT_CHUNK_SIZE;

/// TripPlan - progressive itinerary planner
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Stream, reconcile and inspect multi-day trip plans",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Request a plan from the configured generator and follow it to the end
    Plan {
        /// What the traveller asked for
        request: String,

        /// Destination, also used as enrichment context
        #[arg(short, long)]
        destination: Option<String>,

        /// First day of the trip (YYYY-MM-DD)
        #[arg(short = 's', long)]
        start_date: Option<NaiveDate>,

        /// Number of days
        #[arg(short = 'n', long)]
        days: Option<u32>,

        /// Number of guests
        #[arg(short, long)]
        guests: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Replay a recorded event-stream transcript (or a final JSON document)
    Replay {
        /// Transcript file; `.json` files are streamed as synthetic deltas
        file: PathBuf,

        /// Bytes per replayed chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Pause between chunks in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the event-stream transcript a generator would send for a document
    Record {
        /// Final plan document (JSON)
        document: PathBuf,

        /// Characters per token delta
        #[arg(long, default_value_t = 12)]
        token_chars: usize,
    },

    /// Normalize free-form cost text
    Cost {
        /// Raw cost text, e.g. "$25 to $40"
        text: String,
    },

    /// Show the dedup key for a title
    Key {
        /// Activity title
        title: String,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for plan and replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable itinerary
    #[default]
    Text,
    /// Final snapshot as JSON
    Json,
    /// One JSON line per session event
    Events,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "events" | "jsonl" => Ok(Self::Events),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use text, json, or events", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Events => write!(f, "events"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplan")
        .join("logs")
        .join("tripplan.log")
}

/// Generate the after_help text with config and log locations
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Config search order:\n");
    help.push_str("  --config <path>\n");
    help.push_str("  ./.tripplan.yml\n");
    if let Some(dir) = dirs::config_dir() {
        help.push_str(&format!("  {}\n", dir.join("tripplan").join("tripplan.yml").display()));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}", get_log_path().display()));
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::try_parse_from(["tp"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::try_parse_from([
            "tp",
            "plan",
            "Weekend in San Diego",
            "--destination",
            "San Diego",
            "--start-date",
            "2026-11-06",
            "--days",
            "2",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Plan {
                request,
                destination,
                start_date,
                days,
                guests,
                format,
            }) => {
                assert_eq!(request, "Weekend in San Diego");
                assert_eq!(destination.as_deref(), Some("San Diego"));
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2026, 11, 6));
                assert_eq!(days, Some(2));
                assert_eq!(guests, None);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("Expected Plan command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_plan_rejects_bad_date() {
        assert!(Cli::try_parse_from(["tp", "plan", "trip", "--start-date", "next friday"]).is_err());
    }

    #[test]
    fn test_cli_parse_replay_defaults() {
        let cli = Cli::try_parse_from(["tp", "replay", "turn.sse"]).unwrap();
        match cli.command {
            Some(Command::Replay {
                file,
                chunk_size,
                delay_ms,
                format,
            }) => {
                assert_eq!(file, PathBuf::from("turn.sse"));
                assert_eq!(chunk_size, DEFAULT_CHUNK_SIZE);
                assert_eq!(delay_ms, None);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("Expected Replay command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_cost_and_key() {
        let cli = Cli::try_parse_from(["tp", "cost", "$25 to $40"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Cost { text }) if text == "$25 to $40"));

        let cli = Cli::try_parse_from(["tp", "key", "Visit Balboa Park"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Key { title }) if title == "Visit Balboa Park"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("events".parse::<OutputFormat>(), Ok(OutputFormat::Events));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_global_flags() {
        let cli = Cli::try_parse_from(["tp", "config", "-c", "/tmp/tp.yml", "-l", "debug"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tp.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn test_after_help_mentions_log_path() {
        let help = generate_after_help();
        assert!(help.contains("tripplan.log"));
        assert!(help.contains(".tripplan.yml"));
    }
}
