//! # wwks-link core
//!
//! ```text
//! bytes ──> MessageFramer ──> receive loop ──┬─> keepalive reply (inline)
//!                                            ├─> HandshakeProgress flags
//!                                            └─> Dispatcher ──> ConnectionObserver
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod dispatch;
pub mod envelope;
pub mod framer;
pub mod handshake;
pub mod reporter;
pub mod session;
pub mod validation;

// Re-export main types
pub use builder::PickupClientBuilder;
pub use client::PickupClient;
pub use config::{ClientConfig, DispatchMode, HandshakeIdentity, HandshakeMode, HandshakeTimings};
pub use connection_state::{ConnectionError, ConnectionState, NetworkConnectionState};
pub use envelope::MessageKind;
pub use framer::MessageFramer;
pub use handshake::{HandshakeOutcome, HandshakeProgress, HandshakeSnapshot, HandshakeStep};
pub use validation::{is_valid_ip_address, is_valid_port, strip_illegal_characters};

/// Create a new client builder
pub fn builder() -> PickupClientBuilder {
    PickupClientBuilder::new()
}
