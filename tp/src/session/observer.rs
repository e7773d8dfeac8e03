//! Observer interface between the session controller and the presentation layer

use tokio::sync::mpsc;
use tracing::debug;

use super::state::{Phase, SessionId, SessionOutcome};

/// Receives notifications for the active session
///
/// Callbacks run on the session's driver task while the controller holds its
/// active-session lock. Keep them short and never call back into the
/// controller from inside one.
pub trait SessionObserver: Send + Sync {
    /// Lifecycle change (connecting, streaming)
    fn on_phase(&self, _id: SessionId, _phase: Phase) {}

    /// Status message from the planner
    fn on_status(&self, id: SessionId, message: &str);

    /// Terminal result, delivered once per session
    fn on_outcome(&self, id: SessionId, outcome: &SessionOutcome);
}

/// One observer notification as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Phase { id: SessionId, phase: Phase },
    Status { id: SessionId, message: String },
    Outcome { id: SessionId, outcome: SessionOutcome },
}

impl Notification {
    pub fn session_id(&self) -> SessionId {
        match self {
            Notification::Phase { id, .. } | Notification::Status { id, .. } | Notification::Outcome { id, .. } => *id,
        }
    }
}

/// Forwards notifications into an unbounded channel
///
/// Sending never blocks, so it is safe to use from inside the controller lock.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        debug!("ChannelObserver::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notification: Notification) {
        // Receiver gone means nobody is rendering any more
        if self.tx.send(notification).is_err() {
            debug!("ChannelObserver::send: receiver dropped");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_phase(&self, id: SessionId, phase: Phase) {
        self.send(Notification::Phase { id, phase });
    }

    fn on_status(&self, id: SessionId, message: &str) {
        self.send(Notification::Status {
            id,
            message: message.to_string(),
        });
    }

    fn on_outcome(&self, id: SessionId, outcome: &SessionOutcome) {
        self.send(Notification::Outcome {
            id,
            outcome: outcome.clone(),
        });
    }
}
