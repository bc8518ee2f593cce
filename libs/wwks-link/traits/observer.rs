//! Consumer-facing callbacks
//!
//! The presentation layer never touches the socket. It implements
//! [`ConnectionObserver`] and receives three kinds of notification:
//!
//! ```text
//! Receive loop ──> Dispatcher ──> on_message(kind, raw)   (empty kind = connection ended)
//!      │
//!      ├─────────────────────────> on_log(text)
//!      └─────────────────────────> on_state_changed(state, error, description)
//! ```
//!
//! Callbacks may be invoked from any thread or task. They should return
//! quickly; slow consumers should hand the work off (see [`ChannelObserver`]).

use crate::core::connection_state::{ConnectionError, ConnectionState};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Receives events raised by a [`crate::PickupClient`]
///
/// Every method has a no-op default so implementors only override
/// what they care about.
pub trait ConnectionObserver: Send + Sync + 'static {
    /// A complete inbound message
    ///
    /// `kind` is the name of the element inside the envelope
    /// (e.g. `StockInfoResponse`). An empty `kind` together with an empty
    /// `raw` signals that the connection has ended.
    fn on_message(&self, kind: &str, raw: &str) {
        let _ = (kind, raw);
    }

    /// Diagnostic text, fire-and-forget
    fn on_log(&self, text: &str) {
        let _ = text;
    }

    /// Every `ConnectionState` transition
    fn on_state_changed(&self, state: ConnectionState, error: ConnectionError, description: &str) {
        let _ = (state, error, description);
    }
}

/// Observer that ignores everything
pub struct NoOpObserver;

impl ConnectionObserver for NoOpObserver {}

/// Event forwarded by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Inbound message (empty kind and raw = connection ended)
    Message { kind: String, raw: String },
    /// Diagnostic line
    Log(String),
    /// Connection state transition
    StateChanged {
        state: ConnectionState,
        error: ConnectionError,
        description: String,
    },
}

impl ClientEvent {
    /// Check if this is the end-of-connection marker
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ClientEvent::Message { kind, raw } if kind.is_empty() && raw.is_empty())
    }
}

/// Observer that forwards every callback onto an unbounded crossbeam channel
///
/// Useful when the consumer wants to pull events from its own loop
/// instead of reacting inside the callback.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: Sender<ClientEvent>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end of its channel
    pub fn new() -> (Self, Receiver<ClientEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ClientEvent) {
        // Receiver dropped means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl ConnectionObserver for ChannelObserver {
    fn on_message(&self, kind: &str, raw: &str) {
        self.forward(ClientEvent::Message {
            kind: kind.to_string(),
            raw: raw.to_string(),
        });
    }

    fn on_log(&self, text: &str) {
        self.forward(ClientEvent::Log(text.to_string()));
    }

    fn on_state_changed(&self, state: ConnectionState, error: ConnectionError, description: &str) {
        self.forward(ClientEvent::StateChanged {
            state,
            error,
            description: description.to_string(),
        });
    }
}
