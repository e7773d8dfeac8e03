//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::query::TripFields;

/// TripPlanner - streaming client for the trip planning service
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan trips with the streaming trip planning service",
    version = env!("GIT_DESCRIBE"),
    after_help = after_help()
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
    /// Plan a trip from structured fields
    Plan {
        #[command(flatten)]
        trip: TripArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Plan a trip from a free-form description
    Ask {
        /// What you want, e.g. "5 days in Tokyo for 2 in March, we love food"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the query a plan would send, without contacting the service
    Query {
        #[command(flatten)]
        trip: TripArgs,
    },

    /// Check that the planning service is reachable
    Health,

    /// Interactive prompt; each line starts a new plan and replaces the one in progress
    Repl,

    /// Show client logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Trip form fields
///
/// Everything is optional at the argument level so that missing fields are
/// reported together by the query builder.
#[derive(Debug, Clone, Args)]
pub struct TripArgs {
    /// Where you are going
    #[arg(short, long, default_value = "")]
    pub destination: String,

    /// Where you leave from
    #[arg(short, long, default_value = "")]
    pub origin: String,

    /// First day of the trip (YYYY-MM-DD)
    #[arg(short, long = "start-date", default_value = "")]
    pub start_date: String,

    /// Last day of the trip (YYYY-MM-DD)
    #[arg(short, long = "end-date", default_value = "")]
    pub end_date: String,

    /// Number of travellers
    #[arg(short, long, default_value = "")]
    pub people: String,

    /// Overall budget, e.g. "3000 EUR"
    #[arg(short, long, default_value = "")]
    pub budget: String,

    /// Interests, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub interests: Vec<String>,

    /// Daily spending budget per person
    #[arg(long = "daily-budget")]
    pub daily_budget: Option<String>,
}

impl From<TripArgs> for TripFields {
    fn from(args: TripArgs) -> Self {
        debug!(?args, "TripFields::from(TripArgs): called");
        TripFields {
            destination: args.destination,
            origin: args.origin,
            start_date: args.start_date,
            end_date: args.end_date,
            people: args.people,
            budget: args.budget,
            interests: args.interests,
            daily_budget: args.daily_budget,
        }
    }
}

/// Where and how results are shown
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Write the itinerary map (HTML) to this file
    #[arg(short, long = "map-out")]
    pub map_out: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for plan results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" | "markdown" | "md" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}

/// Path of the client log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}

fn after_help() -> String {
    format!(
        "Config is read from --config, ./.tripplanner.yml or ~/.config/tripplanner/tripplanner.yml\n\
         Logs are written to: {}",
        get_log_path().display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let cli = Cli::try_parse_from([
            "tp",
            "plan",
            "--destination",
            "Tokyo",
            "--origin",
            "Istanbul",
            "--start-date",
            "2025-03-10",
            "--end-date",
            "2025-03-14",
            "--people",
            "2",
            "--budget",
            "3000 EUR",
            "--interests",
            "food,temples",
            "--daily-budget",
            "100 EUR",
            "--map-out",
            "map.html",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Plan { trip, output }) => {
                let fields = TripFields::from(trip);
                assert_eq!(fields.destination, "Tokyo");
                assert_eq!(fields.interests, vec!["food", "temples"]);
                assert_eq!(fields.daily_budget.as_deref(), Some("100 EUR"));
                assert_eq!(output.map_out, Some(PathBuf::from("map.html")));
                assert_eq!(output.format, OutputFormat::Text);
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_missing_fields_reach_builder() {
        let cli = Cli::try_parse_from(["tp", "query", "--destination", "Rome"]).unwrap();
        match cli.command {
            Some(Command::Query { trip }) => {
                let fields = TripFields::from(trip);
                assert_eq!(fields.destination, "Rome");
                assert!(fields.origin.is_empty());
                assert!(fields.interests.is_empty());
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_parse_ask_joins_words() {
        let cli = Cli::try_parse_from(["tp", "ask", "a", "week", "in", "Lisbon", "-f", "json"]).unwrap();
        match cli.command {
            Some(Command::Ask { text, output }) => {
                assert_eq!(text.join(" "), "a week in Lisbon");
                assert_eq!(output.format, OutputFormat::Json);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("tripplanner/logs/tripplanner.log"));
    }
}
