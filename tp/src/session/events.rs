//! Session events and the dispatcher that decodes them from raw SSE frames
//!
//! The planner names each frame (`status`, `final_report`, `error`) and
//! carries a JSON payload. Unknown names are skipped so the upstream can add
//! event kinds without breaking older clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Tag for progress updates
pub const STATUS_EVENT: &str = "status";

/// Tag for the finished itinerary
pub const FINAL_REPORT_EVENT: &str = "final_report";

/// Tag for planner-side failures
pub const ERROR_EVENT: &str = "error";

/// Message used when the planner reports an error without saying what
pub const GENERIC_UPSTREAM_ERROR: &str = "The planning service reported an error.";

/// The finished itinerary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    /// Narrative itinerary in markdown
    pub markdown: String,

    /// Standalone HTML document with the trip map, if the planner made one
    pub map_html: Option<String>,
}

/// A typed, validated event for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Progress message from the planner
    Status { message: String },

    /// The itinerary is ready
    FinalReport(FinalReport),

    /// The planner gave up
    UpstreamError { message: Option<String> },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Status { .. } => STATUS_EVENT,
            SessionEvent::FinalReport(_) => FINAL_REPORT_EVENT,
            SessionEvent::UpstreamError { .. } => ERROR_EVENT,
        }
    }
}

/// A recognised frame whose payload could not be decoded
#[derive(Debug, Error)]
#[error("Malformed '{tag}' payload: {source}")]
pub struct DispatchError {
    pub tag: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct FinalReportPayload {
    markdown_report: String,
    #[serde(default)]
    map_html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

/// Classify one raw frame
///
/// Returns `Ok(None)` for tags this client does not know.
pub fn dispatch(tag: &str, data: &str) -> Result<Option<SessionEvent>, DispatchError> {
    debug!(%tag, data_len = data.len(), "dispatch: called");
    let malformed = |source: serde_json::Error| DispatchError {
        tag: tag.to_string(),
        source,
    };

    let event = match tag {
        STATUS_EVENT => {
            let payload: StatusPayload = serde_json::from_str(data).map_err(malformed)?;
            SessionEvent::Status {
                message: payload.message,
            }
        }
        FINAL_REPORT_EVENT => {
            let payload: FinalReportPayload = serde_json::from_str(data).map_err(malformed)?;
            SessionEvent::FinalReport(FinalReport {
                markdown: payload.markdown_report,
                map_html: payload.map_html,
            })
        }
        ERROR_EVENT => {
            let payload: ErrorPayload = serde_json::from_str(data).map_err(malformed)?;
            SessionEvent::UpstreamError {
                message: payload.message.filter(|m| !m.trim().is_empty()),
            }
        }
        other => {
            debug!(tag = %other, "dispatch: unknown event type, skipping");
            return Ok(None);
        }
    };

    debug!(event_type = event.event_type(), "dispatch: decoded");
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let event = dispatch("status", r#"{"message":"Searching flights"}"#).unwrap();
        assert_eq!(
            event,
            Some(SessionEvent::Status {
                message: "Searching flights".to_string()
            })
        );
    }

    #[test]
    fn test_final_report_with_map() {
        let event = dispatch(
            "final_report",
            r##"{"markdown_report":"# Tokyo","map_html":"<html></html>"}"##,
        )
        .unwrap();
        assert_eq!(
            event,
            Some(SessionEvent::FinalReport(FinalReport {
                markdown: "# Tokyo".to_string(),
                map_html: Some("<html></html>".to_string()),
            }))
        );
    }

    #[test]
    fn test_final_report_null_or_missing_map() {
        for data in [
            r##"{"markdown_report":"# Tokyo","map_html":null}"##,
            r##"{"markdown_report":"# Tokyo"}"##,
        ] {
            match dispatch("final_report", data).unwrap() {
                Some(SessionEvent::FinalReport(report)) => assert!(report.map_html.is_none()),
                other => panic!("Expected FinalReport, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_error_with_and_without_message() {
        assert_eq!(
            dispatch("error", r#"{"message":"No flights"}"#).unwrap(),
            Some(SessionEvent::UpstreamError {
                message: Some("No flights".to_string())
            })
        );
        assert_eq!(
            dispatch("error", "{}").unwrap(),
            Some(SessionEvent::UpstreamError { message: None })
        );
        assert_eq!(
            dispatch("error", r#"{"message":"  "}"#).unwrap(),
            Some(SessionEvent::UpstreamError { message: None })
        );
    }

    #[test]
    fn test_unknown_tag_is_skipped() {
        assert_eq!(dispatch("message", "anything").unwrap(), None);
        assert_eq!(dispatch("heartbeat", "").unwrap(), None);
    }

    #[test]
    fn test_malformed_payload() {
        let err = dispatch("status", "not json").unwrap_err();
        assert_eq!(err.tag, "status");
        assert!(err.to_string().starts_with("Malformed 'status' payload"));

        // Recognised tag with the wrong shape
        assert!(dispatch("final_report", r#"{"map_html":null}"#).is_err());
        assert!(dispatch("status", r#"{"message":42}"#).is_err());
    }
}
