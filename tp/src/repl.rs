//! Interactive planning prompt
//!
//! Each line typed at the prompt is sent to the planner as a free-form
//! request. Typing a new request while one is still streaming replaces it;
//! only the newest request's progress and result are shown.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::query::TripQuery;
use crate::render;
use crate::session::{ChannelObserver, Notification, SessionController, SessionOutcome, SseTransport};

/// A parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Help,
    Quit,
    Cancel,
    Status,
    Unknown(String),
    Plan(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return ReplCommand::Empty;
        }
        if !input.starts_with('/') {
            return ReplCommand::Plan(input.to_string());
        }

        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/help" | "/h" => ReplCommand::Help,
            "/quit" | "/q" | "/exit" => ReplCommand::Quit,
            "/cancel" | "/c" => ReplCommand::Cancel,
            "/status" | "/s" => ReplCommand::Status,
            _ => ReplCommand::Unknown(cmd.to_string()),
        }
    }
}

/// What the readline thread hands to the async loop
enum ReplInput {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

/// Interactive REPL session
pub struct ReplSession {
    controller: SessionController<SseTransport>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    map_file: Option<PathBuf>,
    service_url: String,
}

impl ReplSession {
    pub fn new(config: &Config) -> Result<Self> {
        debug!("ReplSession::new: called");
        let transport = SseTransport::from_config(&config.service)?;
        let service_url = transport.plan_url().to_string();
        let (observer, notifications) = ChannelObserver::new();

        Ok(Self {
            controller: SessionController::new(transport, Arc::new(observer)),
            notifications,
            map_file: config.output.expanded_map_file(),
            service_url,
        })
    }

    /// Run the REPL main loop
    pub async fn run(mut self) -> Result<()> {
        self.print_welcome();

        let (input_tx, mut input_rx) = mpsc::channel(1);
        thread::spawn(move || read_lines(input_tx));

        loop {
            tokio::select! {
                input = input_rx.recv() => match input {
                    Some(ReplInput::Line(line)) => {
                        if !self.handle_command(ReplCommand::parse(&line)) {
                            break;
                        }
                    }
                    Some(ReplInput::Interrupted) => {
                        // Ctrl+C cancels the running plan, if any
                        if let Some(id) = self.controller.cancel() {
                            println!("{} cancelled {}", "^C".dimmed(), id);
                        } else {
                            println!("^C");
                        }
                    }
                    Some(ReplInput::Failed(e)) => {
                        return Err(eyre::eyre!("Readline error: {}", e));
                    }
                    Some(ReplInput::Eof) | None => {
                        println!();
                        break;
                    }
                },
                Some(notification) = self.notifications.recv() => {
                    self.show(notification)?;
                }
            }
        }

        self.controller.cancel();
        println!("Goodbye!");
        Ok(())
    }

    /// Returns false when the REPL should exit
    fn handle_command(&self, command: ReplCommand) -> bool {
        debug!(?command, "handle_command: called");
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Help => self.print_help(),
            ReplCommand::Quit => return false,
            ReplCommand::Cancel => match self.controller.cancel() {
                Some(id) => println!("{}", format!("Cancelled {}.", id).dimmed()),
                None => println!("{}", "Nothing to cancel.".dimmed()),
            },
            ReplCommand::Status => match self.controller.active() {
                Some(id) => println!("{} is running", id),
                None => println!("{}", "Idle.".dimmed()),
            },
            ReplCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
            ReplCommand::Plan(text) => match TripQuery::free_form(&text) {
                Ok(query) => {
                    if let Some(previous) = self.controller.active() {
                        println!("{}", format!("Replacing {}.", previous).dimmed());
                    }
                    let ticket = self.controller.submit(query);
                    info!(id = %ticket.id(), "handle_command: submitted plan");
                }
                Err(errors) => println!("{} {}", "Invalid:".red(), errors),
            },
        }
        true
    }

    fn show(&self, notification: Notification) -> Result<()> {
        if let Some(line) = render::progress_line(&notification) {
            println!("{}", line);
            return Ok(());
        }

        if let Notification::Outcome { id, outcome } = notification {
            println!();
            render::write_outcome(&mut io::stdout(), id, &outcome, OutputFormat::Text)?;
            if let (SessionOutcome::Success(report), Some(path)) = (&outcome, &self.map_file) {
                match render::save_map(report, path) {
                    Ok(true) => println!("{} {}", "Map saved to".dimmed(), path.display()),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, "show: failed to save map");
                        println!("{} {:#}", "Warning:".yellow(), e);
                    }
                }
            }
            println!();
        }
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "TripPlanner Interactive".bright_cyan().bold());
        println!("Planner: {}", self.service_url);
        println!("Describe a trip to plan it. Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!("  {:14} Cancel the plan in progress", "/cancel".yellow());
        println!("  {:14} Show whether a plan is running", "/status".yellow());
        println!();
        println!("Anything else is sent to the planner as a new request.");
        println!();
    }
}

/// Blocking readline loop, run on its own thread
fn read_lines(tx: mpsc::Sender<ReplInput>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            let _ = tx.blocking_send(ReplInput::Failed(format!("Failed to initialize readline: {}", e)));
            return;
        }
    };

    loop {
        let input = match rl.readline(&format!("{} ", ">".bright_green())) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(trimmed);
                }
                ReplInput::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReplInput::Interrupted,
            Err(ReadlineError::Eof) => ReplInput::Eof,
            Err(e) => ReplInput::Failed(e.to_string()),
        };

        let last = matches!(input, ReplInput::Eof | ReplInput::Failed(_));
        if tx.blocking_send(input).is_err() || last {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_plan() {
        assert_eq!(
            ReplCommand::parse("  a weekend in Porto  "),
            ReplCommand::Plan("a weekend in Porto".to_string())
        );
    }

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("/help"), ReplCommand::Help);
        assert_eq!(ReplCommand::parse("/q"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/cancel now"), ReplCommand::Cancel);
        assert_eq!(ReplCommand::parse("/s"), ReplCommand::Status);
        assert_eq!(ReplCommand::parse("/flights"), ReplCommand::Unknown("/flights".to_string()));
    }
}
