//! TripPlanner - streaming trip planning client
//!
//! CLI entry point for submitting plans and watching them stream in.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use tripplanner::cli::{Cli, Command, OutputArgs, OutputFormat, TripArgs, get_log_path};
use tripplanner::config::Config;
use tripplanner::query::{TripFields, TripQuery, ValidationErrors, build_query};
use tripplanner::render;
use tripplanner::repl::ReplSession;
use tripplanner::session::{ChannelObserver, Notification, SessionController, SessionOutcome, SseTransport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

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

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

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
    let cli = Cli::parse();

    // Load configuration first so its log-level can seed logging
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("TripPlanner loaded config: service={}", config.service.base_url);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Plan { trip, output }) => {
            debug!("main: matched Plan command");
            cmd_plan(&config, trip, output).await
        }
        Some(Command::Ask { text, output }) => {
            debug!("main: matched Ask command");
            cmd_ask(&config, &text.join(" "), output).await
        }
        Some(Command::Query { trip }) => {
            debug!("main: matched Query command");
            cmd_query(trip)
        }
        Some(Command::Health) => {
            debug!("main: matched Health command");
            cmd_health(&config).await
        }
        Some(Command::Logs { lines }) => {
            debug!(lines, "main: matched Logs command");
            cmd_logs(lines)
        }
        Some(Command::Repl) | None => {
            debug!("main: no command or Repl, starting interactive prompt");
            ReplSession::new(&config)?.run().await
        }
    }
}

/// Plan a trip from structured fields
async fn cmd_plan(config: &Config, trip: TripArgs, output: OutputArgs) -> Result<()> {
    debug!("cmd_plan: called");
    let fields = TripFields::from(trip);
    let query = build_query(&fields).map_err(report_invalid)?;
    run_plan(config, query, output).await
}

/// Plan a trip from free-form text
async fn cmd_ask(config: &Config, text: &str, output: OutputArgs) -> Result<()> {
    debug!(text_len = text.len(), "cmd_ask: called");
    let query = TripQuery::free_form(text).map_err(report_invalid)?;
    run_plan(config, query, output).await
}

/// Submit one query and render it until it finishes or Ctrl+C
async fn run_plan(config: &Config, query: TripQuery, output: OutputArgs) -> Result<()> {
    debug!(?output, "run_plan: called");
    let transport = SseTransport::from_config(&config.service)?;
    let (observer, mut notifications) = ChannelObserver::new();
    let controller = SessionController::new(transport, Arc::new(observer));

    let ticket = controller.submit(query);
    info!(id = %ticket.id(), "run_plan: submitted");

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let (id, outcome) = loop {
        tokio::select! {
            _ = &mut interrupted => {
                if let Some(cancelled) = controller.cancel() {
                    info!(id = %cancelled, "run_plan: interrupted");
                }
                ticket.finished().await;
                return Err(eyre::eyre!("Cancelled"));
            }
            notification = notifications.recv() => match notification {
                Some(Notification::Outcome { id, outcome }) => break (id, outcome),
                Some(other) => {
                    if let Some(line) = render::progress_line(&other) {
                        eprintln!("{}", line);
                    }
                }
                None => return Err(eyre::eyre!("Planner session ended without a result")),
            },
        }
    };
    ticket.finished().await;

    match outcome {
        SessionOutcome::Success(ref report) => {
            render::write_outcome(&mut io::stdout(), id, &outcome, output.format)?;

            let map_path = output.map_out.clone().or_else(|| config.output.expanded_map_file());
            if let Some(path) = map_path {
                if render::save_map(report, &path)? {
                    eprintln!("{} {}", "Map saved to".dimmed(), path.display());
                } else if output.map_out.is_some() {
                    warn!("run_plan: --map-out given but the report has no map");
                    eprintln!("{} the planner returned no map", "Warning:".yellow());
                }
            }
            Ok(())
        }
        SessionOutcome::Failed(failure) => {
            if output.format == OutputFormat::Json {
                render::write_outcome(&mut io::stdout(), id, &SessionOutcome::Failed(failure.clone()), output.format)?;
            }
            Err(eyre::Report::new(failure).wrap_err("Trip planning failed"))
        }
    }
}

/// Print the query that would be sent
fn cmd_query(trip: TripArgs) -> Result<()> {
    debug!("cmd_query: called");
    let fields = TripFields::from(trip);
    let query = build_query(&fields).map_err(report_invalid)?;
    println!("{}", query);
    Ok(())
}

/// Check that the planning service answers
async fn cmd_health(config: &Config) -> Result<()> {
    debug!("cmd_health: called");
    let transport = SseTransport::from_config(&config.service)?;
    match transport.health().await {
        Ok(status) => {
            println!("{} {} ({})", "✓".green(), config.service.base_url, status);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red(), config.service.base_url);
            Err(eyre::Report::new(e).wrap_err("Planning service is not reachable"))
        }
    }
}

/// Show the last N lines of the client log
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path: PathBuf = get_log_path();

    if !log_path.exists() {
        debug!(?log_path, "cmd_logs: log file does not exist");
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}

/// Print field errors to stderr and turn them into a report
fn report_invalid(errors: ValidationErrors) -> eyre::Report {
    debug!(count = errors.len(), "report_invalid: called");
    eprintln!("{}", "Please fix the following:".red().bold());
    for (field, message) in errors.iter() {
        eprintln!("  {} {}", format!("{}:", field.key()).yellow(), message);
    }
    eyre::eyre!("{} invalid field(s)", errors.len())
}
