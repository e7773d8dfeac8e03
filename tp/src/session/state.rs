//! Session state machine
//!
//! ```text
//! Idle ──▶ Connecting ──▶ Streaming ──▶ Succeeded
//!               │             │
//!               └─────────────┴───────▶ Failed
//! ```
//!
//! Transitions are synchronous: [`Session::handle`] consumes one transport
//! event and says what, if anything, observers should hear. Terminal
//! sessions and sessions whose cancellation token fired ignore everything.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{self, FinalReport, GENERIC_UPSTREAM_ERROR, SessionEvent};
use super::transport::{EVENT_STREAM_CONTENT_TYPE, TransportEvent};

/// Message for a stream that ends without a report or error
pub const PREMATURE_CLOSE_MESSAGE: &str = "stream ended before completion";

/// Monotonic session identifier, unique per controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Connecting,
    Streaming,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Streaming => "streaming",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a session failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The server answered, but not with an event stream
    ConnectionRejected { status: u16, content_type: Option<String> },

    /// The planner reported a failure
    ApplicationError,

    /// The stream ended with no report and no error
    PrematureClose,

    /// Network or protocol failure
    TransportError,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::ConnectionRejected { .. } => "connection_rejected",
            FailureKind::ApplicationError => "application_error",
            FailureKind::PrematureClose => "premature_close",
            FailureKind::TransportError => "transport_error",
        }
    }
}

/// A failed session, with the message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Terminal result delivered to observers exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Success(FinalReport),
    Failed(SessionFailure),
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Success(_))
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        match self {
            SessionOutcome::Failed(failure) => Some(failure),
            SessionOutcome::Success(_) => None,
        }
    }
}

/// What one transition produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing observable happened
    Ignored,

    /// Connection confirmed as an event stream
    Streaming,

    /// New status message
    Status(String),

    /// Terminal state reached
    Finished(SessionOutcome),
}

/// One planning request from submission to terminal state
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    phase: Phase,
    last_status: Option<String>,
    outcome: Option<SessionOutcome>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(id: SessionId, cancel: CancellationToken) -> Self {
        debug!(%id, "Session::new: called");
        Self {
            id,
            phase: Phase::Idle,
            last_status: None,
            outcome: None,
            cancel,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Token that tears down this session's transport
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request transport teardown; safe to call any number of times
    pub fn cancel(&self) {
        debug!(id = %self.id, "Session::cancel: called");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Idle → Connecting; false if the session already left Idle
    pub fn begin(&mut self) -> bool {
        if self.phase != Phase::Idle {
            debug!(id = %self.id, phase = %self.phase, "Session::begin: not idle");
            return false;
        }
        self.phase = Phase::Connecting;
        true
    }

    /// Apply one transport event
    pub fn handle(&mut self, event: TransportEvent) -> Step {
        if self.phase.is_terminal() {
            debug!(id = %self.id, ?event, "Session::handle: terminal, ignoring");
            return Step::Ignored;
        }
        if self.cancel.is_cancelled() {
            // Superseded or withdrawn: late events carry no meaning
            debug!(id = %self.id, ?event, "Session::handle: cancelled, ignoring");
            return Step::Ignored;
        }

        match event {
            TransportEvent::Opened { status, content_type } => self.on_opened(status, content_type),
            TransportEvent::Message { event, data } => self.on_message(&event, &data),
            TransportEvent::Closed => {
                debug!(id = %self.id, phase = %self.phase, "Session::handle: closed before completion");
                self.fail(FailureKind::PrematureClose, PREMATURE_CLOSE_MESSAGE.to_string())
            }
            TransportEvent::Failed { message } => {
                debug!(id = %self.id, %message, "Session::handle: transport failed");
                self.fail(FailureKind::TransportError, message)
            }
        }
    }

    fn on_opened(&mut self, status: u16, content_type: Option<String>) -> Step {
        if self.phase != Phase::Connecting {
            debug!(id = %self.id, phase = %self.phase, "on_opened: not connecting, ignoring");
            return Step::Ignored;
        }

        if is_event_stream(status, content_type.as_deref()) {
            debug!(id = %self.id, "on_opened: streaming");
            self.phase = Phase::Streaming;
            return Step::Streaming;
        }

        let message = format!(
            "The planning service rejected the request (status {}, content type {}).",
            status,
            content_type.as_deref().unwrap_or("none")
        );
        self.fail(FailureKind::ConnectionRejected { status, content_type }, message)
    }

    fn on_message(&mut self, tag: &str, data: &str) -> Step {
        if self.phase != Phase::Streaming {
            debug!(id = %self.id, %tag, phase = %self.phase, "on_message: not streaming, ignoring");
            return Step::Ignored;
        }

        match events::dispatch(tag, data) {
            Ok(Some(SessionEvent::Status { message })) => {
                debug!(id = %self.id, %message, "on_message: status");
                self.last_status = Some(message.clone());
                Step::Status(message)
            }
            Ok(Some(SessionEvent::FinalReport(report))) => {
                info!(id = %self.id, has_map = report.map_html.is_some(), "on_message: final report received");
                self.finish(SessionOutcome::Success(report))
            }
            Ok(Some(SessionEvent::UpstreamError { message })) => {
                let message = message.unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string());
                self.fail(FailureKind::ApplicationError, message)
            }
            Ok(None) => Step::Ignored,
            Err(e) => {
                warn!(id = %self.id, error = %e, "on_message: dropping malformed event");
                Step::Ignored
            }
        }
    }

    fn fail(&mut self, kind: FailureKind, message: String) -> Step {
        warn!(id = %self.id, kind = kind.name(), %message, "Session: failed");
        self.finish(SessionOutcome::Failed(SessionFailure { kind, message }))
    }

    /// Enter the terminal state and release the transport
    fn finish(&mut self, outcome: SessionOutcome) -> Step {
        self.phase = if outcome.is_success() {
            Phase::Succeeded
        } else {
            Phase::Failed
        };
        self.outcome = Some(outcome.clone());
        self.cancel.cancel();
        Step::Finished(outcome)
    }
}

/// 200 OK with an event-stream media type (parameters ignored)
///
/// Any other 2xx ends the eventsource stream right away, so it is rejected
/// here rather than surfacing later as a premature close.
fn is_event_stream(status: u16, content_type: Option<&str>) -> bool {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    status == 200 && media_type.as_deref() == Some(EVENT_STREAM_CONTENT_TYPE)
}
