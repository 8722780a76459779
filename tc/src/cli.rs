//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TripCraft - budget-aware trip planner
#[derive(Parser)]
#[command(
    name = "tc",
    about = "Budget-aware trip planning pipeline with incremental modifications",
    version,
    after_help = "Logs are written to: ~/.local/share/tripcraft/logs/tripcraft.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Split a total budget into category allocations
    Allocate {
        /// Total trip budget
        budget: f64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show stage execution order and prerequisites
    Graph {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Plan a trip from a request file, optionally applying changes
    Plan {
        /// Trip request (YAML)
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Modifications to queue and apply after planning (YAML list)
        #[arg(long, value_name = "CHANGES")]
        changes: Option<PathBuf>,

        /// Write session events as JSON lines to this file
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for command results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_allocate() {
        let cli = Cli::parse_from(["tc", "allocate", "15000000"]);
        if let Command::Allocate { budget, format } = cli.command {
            assert_eq!(budget, 15_000_000.0);
            assert_eq!(format, OutputFormat::Text);
        } else {
            panic!("Expected Allocate command");
        }
    }

    #[test]
    fn test_cli_parse_graph_json() {
        let cli = Cli::parse_from(["tc", "graph", "--format", "json"]);
        assert!(matches!(cli.command, Command::Graph { format: OutputFormat::Json }));
    }

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::parse_from(["tc", "plan", "bali.yml", "--changes", "mods.yml", "-f", "json"]);
        if let Command::Plan {
            request,
            changes,
            events,
            format,
        } = cli.command
        {
            assert_eq!(request, PathBuf::from("bali.yml"));
            assert_eq!(changes, Some(PathBuf::from("mods.yml")));
            assert!(events.is_none());
            assert_eq!(format, OutputFormat::Json);
        } else {
            panic!("Expected Plan command");
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["tc", "-c", "/path/to/config.yml", "graph", "-v"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert!(cli.verbose);
    }
}
