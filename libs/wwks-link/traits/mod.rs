//! # wwks-link Traits
//!
//! Seams of the robot link:
//!
//! - **ConnectionObserver**: receive messages, logs and state changes
//! - **KeepaliveResponder**: detect keepalive pings and build their replies
//! - **MessageSink**: anything that can put a message on the wire
//! - **ReconnectionStrategy** / **Reconnectable**: supervised reconnection

pub mod error;
pub mod keepalive;
pub mod observer;
pub mod reconnect;
pub mod sink;

// Re-export commonly used types
pub use error::{LinkError, Result};
pub use keepalive::{KeepaliveIds, KeepaliveResponder, NoOpKeepalive, WwksKeepalive};
pub use observer::{ChannelObserver, ClientEvent, ConnectionObserver, NoOpObserver};
pub use reconnect::{FixedDelay, Reconnectable, ReconnectionStrategy};
pub use sink::MessageSink;
