//! Transport boundary: opening the planner's event stream
//!
//! A transport turns a query into a stream of [`TransportEvent`]s. The
//! session never sees HTTP or SSE types, only this small vocabulary, which
//! keeps the state machine testable with scripted streams.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest_eventsource::{Event, EventSource, retry};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::query::TripQuery;

/// Media type the planner must answer with
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Stream of transport events for one session
pub type TransportStream = BoxStream<'static, TransportEvent>;

/// What the transport observed, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The server answered; status and content type decide whether it is a stream
    Opened { status: u16, content_type: Option<String> },

    /// One named frame
    Message { event: String, data: String },

    /// The server closed the stream
    Closed,

    /// Low-level failure (network, protocol, decoding)
    Failed { message: String },
}

/// Errors raised before a stream exists
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid planner URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to open event stream: {0}")]
    Open(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Opens event streams for planning queries
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the exchange for `query`
    ///
    /// Dropping the returned stream must release the connection.
    async fn open(&self, query: &TripQuery) -> Result<TransportStream, TransportError>;
}

/// Planner transport over HTTP server-sent events
pub struct SseTransport {
    http: Client,
    plan_url: String,
    health_url: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl SseTransport {
    /// Build a transport from the service section of the config
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TransportError> {
        debug!(?config, "SseTransport::from_config: called");
        let plan_url = join_url(&config.base_url, &config.plan_path)?;
        let health_url = join_url(&config.base_url, &config.health_path)?;

        // No overall timeout: a plan can stream for minutes
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self {
            http,
            plan_url,
            health_url,
        })
    }

    pub fn plan_url(&self) -> &str {
        &self.plan_url
    }

    /// Ask the service whether it is up; returns its status line
    pub async fn health(&self) -> Result<String, TransportError> {
        debug!(url = %self.health_url, "health: called");
        let response = self.http.get(&self.health_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "health: non-success status");
            return Err(TransportError::InvalidResponse(format!(
                "health check returned status {}",
                status.as_u16()
            )));
        }

        let body: HealthResponse = response.json().await?;
        debug!(status = %body.status, "health: ok");
        Ok(body.status)
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self, query: &TripQuery) -> Result<TransportStream, TransportError> {
        debug!(url = %self.plan_url, query_len = query.as_str().len(), "open: called");
        let request = self
            .http
            .post(&self.plan_url)
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .json(&query.to_request_body());

        let mut es = EventSource::new(request).map_err(|e| {
            debug!(error = %e, "open: EventSource creation failed");
            TransportError::Open(e.to_string())
        })?;

        // Reconnecting would submit the plan a second time
        es.set_retry_policy(Box::new(retry::Never));

        Ok(es.map(translate).boxed())
    }
}

/// Map one eventsource item onto the transport vocabulary
fn translate(item: Result<Event, reqwest_eventsource::Error>) -> TransportEvent {
    match item {
        Ok(Event::Open) => {
            // EventSource only yields Open for a 200 with an event-stream body
            debug!("translate: Event::Open");
            TransportEvent::Opened {
                status: 200,
                content_type: Some(EVENT_STREAM_CONTENT_TYPE.to_string()),
            }
        }
        Ok(Event::Message(msg)) => {
            debug!(event = %msg.event, "translate: Event::Message");
            TransportEvent::Message {
                event: msg.event,
                data: msg.data,
            }
        }
        Err(reqwest_eventsource::Error::StreamEnded) => {
            debug!("translate: stream ended");
            TransportEvent::Closed
        }
        Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
            debug!(%status, "translate: invalid status code");
            TransportEvent::Opened {
                status: status.as_u16(),
                content_type: header_text(response.headers().get(CONTENT_TYPE)),
            }
        }
        Err(reqwest_eventsource::Error::InvalidContentType(value, response)) => {
            debug!(?value, "translate: invalid content type");
            TransportEvent::Opened {
                status: response.status().as_u16(),
                content_type: header_text(Some(&value)),
            }
        }
        Err(e) => {
            debug!(error = %e, "translate: transport error");
            TransportEvent::Failed { message: e.to_string() }
        }
    }
}

/// Header value as text; absent, blank or non-ASCII values read as None
fn header_text(value: Option<&HeaderValue>) -> Option<String> {
    value
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn join_url(base: &str, path: &str) -> Result<String, TransportError> {
    let base = base.trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(TransportError::InvalidUrl {
            url: base.to_string(),
            message: "expected an http:// or https:// URL".to_string(),
        });
    }
    if path.is_empty() {
        return Ok(format!("{}/", base));
    }
    Ok(format!("{}/{}", base, path.trim_start_matches('/')))
}

#[cfg(test)]
pub mod mock {
    //! Scripted transport for controller tests

    use super::*;
    use futures::channel::mpsc;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out pre-registered connections in order
    #[derive(Default)]
    pub struct ChannelTransport {
        pending: Mutex<VecDeque<Result<mpsc::UnboundedReceiver<TransportEvent>, String>>>,
        queries: Mutex<Vec<TripQuery>>,
    }

    impl ChannelTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a connection for the next `open`
        pub fn connection(&self) -> Connection {
            let (tx, rx) = mpsc::unbounded();
            self.pending.lock().unwrap().push_back(Ok(rx));
            Connection { tx }
        }

        /// Make the next `open` fail
        pub fn refuse(&self, message: &str) {
            self.pending.lock().unwrap().push_back(Err(message.to_string()));
        }

        /// Queries passed to `open`, in order
        pub fn queries(&self) -> Vec<TripQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn open(&self, query: &TripQuery) -> Result<TransportStream, TransportError> {
            self.queries.lock().unwrap().push(query.clone());
            match self.pending.lock().unwrap().pop_front() {
                Some(Ok(rx)) => Ok(rx.boxed()),
                Some(Err(message)) => Err(TransportError::Open(message)),
                None => Err(TransportError::Open("no scripted connection".to_string())),
            }
        }
    }

    /// Server side of a scripted connection; dropping it ends the stream
    #[derive(Clone)]
    pub struct Connection {
        tx: mpsc::UnboundedSender<TransportEvent>,
    }

    impl Connection {
        pub fn send(&self, event: TransportEvent) {
            // The session may already have hung up
            let _ = self.tx.unbounded_send(event);
        }

        pub fn open_ok(&self) {
            self.open_with(200, Some(EVENT_STREAM_CONTENT_TYPE));
        }

        pub fn open_with(&self, status: u16, content_type: Option<&str>) {
            self.send(TransportEvent::Opened {
                status,
                content_type: content_type.map(String::from),
            });
        }

        pub fn frame(&self, event: &str, data: &str) {
            self.send(TransportEvent::Message {
                event: event.to_string(),
                data: data.to_string(),
            });
        }

        pub fn status(&self, message: &str) {
            self.frame("status", &serde_json::json!({ "message": message }).to_string());
        }

        pub fn final_report(&self, markdown: &str, map_html: Option<&str>) {
            self.frame(
                "final_report",
                &serde_json::json!({ "markdown_report": markdown, "map_html": map_html }).to_string(),
            );
        }

        pub fn error(&self, message: &str) {
            self.frame("error", &serde_json::json!({ "message": message }).to_string());
        }

        pub fn close(&self) {
            self.send(TransportEvent::Closed);
        }

        pub fn fail(&self, message: &str) {
            self.send(TransportEvent::Failed {
                message: message.to_string(),
            });
        }
    }
}
