//! Terminal presentation of session notifications

use std::fs;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::session::{FinalReport, Notification, Phase, SessionId, SessionOutcome};

/// Progress line for a non-terminal notification
///
/// Returns `None` for outcomes, which are rendered by [`write_outcome`].
pub fn progress_line(notification: &Notification) -> Option<String> {
    match notification {
        Notification::Phase {
            phase: Phase::Connecting,
            ..
        } => Some(format!("{} connecting to the planner...", "~".dimmed())),
        Notification::Phase {
            phase: Phase::Streaming,
            ..
        } => Some(format!("{} planning started", "~".dimmed())),
        Notification::Phase { .. } => None,
        Notification::Status { message, .. } => Some(format!("{} {}", ">".cyan(), message)),
        Notification::Outcome { .. } => None,
    }
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    session: SessionId,
    #[serde(flatten)]
    outcome: &'a SessionOutcome,
}

/// Write a terminal outcome to `out`
///
/// Text format prints the itinerary markdown for a success and a red error
/// line for a failure. JSON format prints the outcome as one object.
pub fn write_outcome<W: Write>(
    out: &mut W,
    id: SessionId,
    outcome: &SessionOutcome,
    format: OutputFormat,
) -> Result<()> {
    debug!(%id, ?format, "write_outcome: called");
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonOutcome { session: id, outcome })?;
            writeln!(out, "{}", json)?;
        }
        OutputFormat::Text => match outcome {
            SessionOutcome::Success(report) => {
                writeln!(out, "{}", report.markdown.trim_end())?;
            }
            SessionOutcome::Failed(failure) => {
                writeln!(
                    out,
                    "{} {} ({})",
                    "Error:".red().bold(),
                    failure.message,
                    failure.kind.name().dimmed()
                )?;
            }
        },
    }
    Ok(())
}

/// Save the report's map HTML to `path`
///
/// Returns `false` when the report carries no map.
pub fn save_map(report: &FinalReport, path: &Path) -> Result<bool> {
    debug!(?path, "save_map: called");
    let Some(html) = report.map_html.as_deref() else {
        debug!("save_map: report has no map");
        return Ok(false);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, html).context(format!("Failed to write map to {}", path.display()))?;
    info!("Saved itinerary map to {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FailureKind, SessionFailure};
    use tempfile::TempDir;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_progress_lines() {
        plain();
        let id = SessionId(1);
        let connecting = Notification::Phase {
            id,
            phase: Phase::Connecting,
        };
        assert_eq!(progress_line(&connecting).unwrap(), "~ connecting to the planner...");

        let status = Notification::Status {
            id,
            message: "Finding flights".to_string(),
        };
        assert_eq!(progress_line(&status).unwrap(), "> Finding flights");

        let outcome = Notification::Outcome {
            id,
            outcome: SessionOutcome::Success(FinalReport {
                markdown: String::new(),
                map_html: None,
            }),
        };
        assert!(progress_line(&outcome).is_none());
    }

    #[test]
    fn test_write_outcome_text() {
        plain();
        let mut out = Vec::new();
        let outcome = SessionOutcome::Success(FinalReport {
            markdown: "# Day 1\n\n".to_string(),
            map_html: None,
        });
        write_outcome(&mut out, SessionId(1), &outcome, OutputFormat::Text).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# Day 1\n");

        let mut out = Vec::new();
        let outcome = SessionOutcome::Failed(SessionFailure {
            kind: FailureKind::PrematureClose,
            message: "stream ended before completion".to_string(),
        });
        write_outcome(&mut out, SessionId(1), &outcome, OutputFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Error: stream ended before completion"));
    }

    #[test]
    fn test_write_outcome_json() {
        let mut out = Vec::new();
        let outcome = SessionOutcome::Success(FinalReport {
            markdown: "# Trip".to_string(),
            map_html: Some("<html/>".to_string()),
        });
        write_outcome(&mut out, SessionId(7), &outcome, OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["session"], 7);
        assert_eq!(value["outcome"], "success");
    }

    #[test]
    fn test_save_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maps").join("trip.html");
        let report = FinalReport {
            markdown: "# Trip".to_string(),
            map_html: Some("<html>map</html>".to_string()),
        };
        assert!(save_map(&report, &path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>map</html>");

        let no_map = FinalReport {
            markdown: "# Trip".to_string(),
            map_html: None,
        };
        assert!(!save_map(&no_map, &dir.path().join("none.html")).unwrap());
    }
}
