//! TripPlanner - streaming client for a trip planning service
//!
//! TripPlanner turns a trip description into a planning request, opens a
//! server-sent event stream to the planner, shows progress as it arrives and
//! renders the final itinerary. Only the most recently submitted request is
//! ever allowed to update the display.
//!
//! # Modules
//!
//! - [`query`] - trip form fields, validation and query text
//! - [`session`] - event decoding, SSE transport, session state machine and controller
//! - [`render`] - terminal output for progress and outcomes
//! - [`repl`] - interactive prompt
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod query;
pub mod render;
pub mod repl;
pub mod session;

// Re-export commonly used types
pub use config::{Config, OutputConfig, ServiceConfig};
pub use query::{Field, TripFields, TripQuery, ValidationErrors, build_query};
pub use session::{
    ChannelObserver, FailureKind, FinalReport, Notification, Phase, SessionController, SessionEvent, SessionFailure,
    SessionId, SessionObserver, SessionOutcome, SseTransport, Transport, TransportError, TransportEvent,
};
