//! # wwks-link
//!
//! Persistent TCP link between a pickup terminal and a robot controller
//! speaking the WWKS 2.0 XML protocol.
//!
//! ## Features
//!
//! - **Stream framing**: envelopes split on the literal closing tag across arbitrary reads
//! - **Keepalive**: robot pings answered inline, never surfaced to the consumer
//! - **Handshake**: Hello / Status / StockInfo sequence, fixed-delay or event-driven
//! - **Ordered dispatch**: one dispatcher thread per connection, arrival order preserved
//! - **Liveness**: 12 consecutive 10s read timeouts end the connection
//! - **Reconnect supervisor**: bounded retries, then pause until the user resumes
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wwks_link::{ChannelObserver, ClientConfig, ClientEvent, PickupClient};
//!
//! #[tokio::main]
//! async fn main() -> wwks_link::Result<()> {
//!     let (observer, events) = ChannelObserver::new();
//!     let client = PickupClient::new(ClientConfig::default(), Arc::new(observer))?;
//!
//!     if !client.connect("127.0.0.1", 6050).await {
//!         client.start_polling("127.0.0.1", 6050).await;
//!     }
//!
//!     for event in events.iter() {
//!         if let ClientEvent::Message { kind, raw } = event {
//!             println!("{}: {} bytes", kind, raw.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder, client, config, connection_state, envelope, framer, handshake, validation,
    ClientConfig, ConnectionError, ConnectionState, DispatchMode, HandshakeIdentity,
    HandshakeMode, HandshakeOutcome, HandshakeSnapshot, HandshakeStep, HandshakeTimings,
    MessageFramer, MessageKind, NetworkConnectionState, PickupClient, PickupClientBuilder,
};

// Re-export manager
pub use manager::{PollingHandle, PollingOutcome, ReconnectSupervisor};

// Convenience function
pub use core::builder as client_builder;
