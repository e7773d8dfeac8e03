//! SessionController - owns the single active planning session
//!
//! Each submission gets a fresh [`Session`] and a driver task. The
//! controller remembers which session is active; every notification is
//! published under that slot's lock after comparing ids, so a superseded
//! session can never reach the observer once `submit` has returned, whatever
//! its transport still delivers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::observer::SessionObserver;
use super::state::{Phase, Session, SessionId, Step};
use super::transport::{Transport, TransportEvent};
use crate::query::{TripFields, TripQuery, ValidationErrors, build_query};

/// The session allowed to produce observable effects
struct Active {
    id: SessionId,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Slot {
    last_id: u64,
    active: Option<Active>,
}

/// State shared between the controller and its driver tasks
struct Shared {
    slot: Mutex<Slot>,
    observer: Arc<dyn SessionObserver>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Observers run under this lock; a panicking one must not wedge the controller
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward one step to the observer if `id` is still active
    ///
    /// Returns false when the session has been superseded.
    fn publish(&self, id: SessionId, step: &Step) -> bool {
        let mut slot = self.lock();
        let is_active = slot.active.as_ref().is_some_and(|a| a.id == id);
        if !is_active {
            debug!(%id, ?step, "Shared::publish: superseded, discarding");
            return false;
        }

        match step {
            Step::Ignored => {}
            Step::Streaming => self.observer.on_phase(id, Phase::Streaming),
            Step::Status(message) => self.observer.on_status(id, message),
            Step::Finished(outcome) => {
                self.observer.on_outcome(id, outcome);
                slot.active = None;
            }
        }
        true
    }
}

/// Handle for a submitted session
pub struct SessionTicket {
    id: SessionId,
    handle: JoinHandle<()>,
}

impl SessionTicket {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait until the session's driver task has exited
    pub async fn finished(self) {
        if let Err(e) = self.handle.await {
            warn!(id = %self.id, error = %e, "SessionTicket::finished: driver task failed");
        }
    }
}

/// Drives planning sessions, one active at a time
pub struct SessionController<T: Transport + 'static> {
    transport: Arc<T>,
    shared: Arc<Shared>,
}

impl<T: Transport + 'static> SessionController<T> {
    pub fn new(transport: T, observer: Arc<dyn SessionObserver>) -> Self {
        debug!("SessionController::new: called");
        Self {
            transport: Arc::new(transport),
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                observer,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the query from form fields and submit it
    ///
    /// Validation failures are returned and nothing is started; the active
    /// session, if any, keeps running.
    pub fn submit_fields(&self, fields: &TripFields) -> Result<SessionTicket, ValidationErrors> {
        debug!("submit_fields: called");
        let query = build_query(fields)?;
        Ok(self.submit(query))
    }

    /// Start a new session for `query`, superseding the active one
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, query: TripQuery) -> SessionTicket {
        let cancel = CancellationToken::new();

        let id = {
            let mut slot = self.shared.lock();
            slot.last_id += 1;
            let id = SessionId(slot.last_id);

            if let Some(previous) = slot.active.replace(Active {
                id,
                cancel: cancel.clone(),
            }) {
                info!(previous = %previous.id, next = %id, "submit: superseding active session");
                previous.cancel.cancel();
            }

            self.shared.observer.on_phase(id, Phase::Connecting);
            id
        };

        info!(%id, "submit: session started");
        let mut session = Session::new(id, cancel);
        session.begin();

        let handle = tokio::spawn(drive(self.transport.clone(), self.shared.clone(), session, query));
        SessionTicket { id, handle }
    }

    /// Withdraw the active session without notifying
    ///
    /// Returns the withdrawn session's id, or None if nothing was active.
    pub fn cancel(&self) -> Option<SessionId> {
        let mut slot = self.shared.lock();
        let active = slot.active.take()?;
        info!(id = %active.id, "cancel: withdrawing active session");
        active.cancel.cancel();
        Some(active.id)
    }

    /// Id of the session currently allowed to notify
    pub fn active(&self) -> Option<SessionId> {
        self.shared.lock().active.as_ref().map(|a| a.id)
    }
}

impl<T: Transport + 'static> Drop for SessionController<T> {
    fn drop(&mut self) {
        if let Some(id) = self.cancel() {
            debug!(%id, "SessionController::drop: cancelled active session");
        }
    }
}

/// Per-session driver: open the transport and feed events through the state machine
async fn drive<T: Transport>(transport: Arc<T>, shared: Arc<Shared>, mut session: Session, query: TripQuery) {
    let id = session.id();
    let cancel = session.cancellation();
    debug!(%id, "drive: called");

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%id, "drive: cancelled while opening");
            return;
        }
        result = transport.open(&query) => result,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            warn!(%id, error = %e, "drive: failed to open transport");
            let step = session.handle(TransportEvent::Failed { message: e.to_string() });
            shared.publish(id, &step);
            return;
        }
    };

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%id, phase = %session.phase(), "drive: cancelled, releasing transport");
                break;
            }
            next = stream.next() => next,
        };

        let ended = event.is_none();
        let step = session.handle(event.unwrap_or(TransportEvent::Closed));
        if !shared.publish(id, &step) {
            session.cancel();
            break;
        }
        if ended || session.phase().is_terminal() {
            break;
        }
    }

    debug!(%id, phase = %session.phase(), "drive: done");
}
