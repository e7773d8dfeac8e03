//! Streaming planning sessions
//!
//! A session is one planning request from submission to a terminal outcome.
//! The pieces, leaf first:
//!
//! - [`events`] - decodes raw SSE frames into [`SessionEvent`]s
//! - [`transport`] - opens the planner's event stream ([`SseTransport`])
//! - [`state`] - the per-session state machine ([`Session`])
//! - [`controller`] - supersession and observer notification ([`SessionController`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tripplanner::session::{ChannelObserver, SessionController, SseTransport};
//!
//! let transport = SseTransport::from_config(&config.service)?;
//! let (observer, mut rx) = ChannelObserver::new();
//! let controller = SessionController::new(transport, Arc::new(observer));
//!
//! let ticket = controller.submit_fields(&fields)?;
//! while let Some(notification) = rx.recv().await {
//!     println!("{:?}", notification);
//! }
//! ```

pub mod controller;
pub mod events;
pub mod observer;
pub mod state;
pub mod transport;

pub use controller::{SessionController, SessionTicket};
pub use events::{DispatchError, FinalReport, SessionEvent, dispatch};
pub use observer::{ChannelObserver, Notification, SessionObserver};
pub use state::{FailureKind, Phase, Session, SessionFailure, SessionId, SessionOutcome, Step};
pub use transport::{SseTransport, Transport, TransportError, TransportEvent, TransportStream};
