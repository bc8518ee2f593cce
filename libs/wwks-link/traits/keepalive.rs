use crate::core::envelope;

/// Trait for recognising the keepalive ping and building its reply
///
/// The robot sends keepalive pings as regular protocol messages. When one is
/// detected the receive loop sends the reply inline, before any other
/// message from the same read is dispatched, and the ping itself is never
/// handed to the consumer.
///
/// # Flow
/// ```text
/// Robot ──[KeepAliveRequest Id=7 Source=A Destination=B]──> Client
///                                                            │
///                                                            ├─> is_ping() == true
///                                                            ├─> pong_response()
///                                                            │
/// Robot <──[KeepAliveResponse Id=7 Source=B Destination=A]── Client
/// ```
pub trait KeepaliveResponder: Send + Sync {
    /// Check if a complete inbound message is a keepalive ping
    fn is_ping(&self, message: &str) -> bool;

    /// Build the reply for a ping
    ///
    /// Returns `None` when the identifiers cannot be located; the ping is
    /// then ignored.
    fn pong_response(&self, message: &str) -> Option<String>;
}

/// Identifiers carried by a keepalive ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepaliveIds {
    pub id: String,
    pub source: String,
    pub destination: String,
}

impl KeepaliveIds {
    /// Extract `Id`, `Source` and `Destination` from a `KeepAliveRequest`
    ///
    /// Attributes are read from the request's start tag only, so attributes
    /// on the envelope or on sibling elements are never picked up.
    pub fn extract(message: &str) -> Option<Self> {
        let tag = envelope::start_tag(message, WwksKeepalive::REQUEST)?;
        Some(Self {
            id: envelope::attribute(tag, "Id")?.to_string(),
            source: envelope::attribute(tag, "Source")?.to_string(),
            destination: envelope::attribute(tag, "Destination")?.to_string(),
        })
    }

    /// Build the paired response: same `Id`, `Source`/`Destination` swapped
    pub fn reply(&self) -> String {
        envelope::wrap(&format!(
            "<{} Id=\"{}\" Source=\"{}\" Destination=\"{}\" />",
            WwksKeepalive::RESPONSE,
            self.id,
            self.destination,
            self.source
        ))
    }
}

/// Keepalive handling for the WWKS protocol
pub struct WwksKeepalive;

impl WwksKeepalive {
    pub const REQUEST: &'static str = "KeepAliveRequest";
    pub const RESPONSE: &'static str = "KeepAliveResponse";
}

impl KeepaliveResponder for WwksKeepalive {
    fn is_ping(&self, message: &str) -> bool {
        envelope::start_tag(message, Self::REQUEST).is_some()
    }

    fn pong_response(&self, message: &str) -> Option<String> {
        KeepaliveIds::extract(message).map(|ids| ids.reply())
    }
}

/// Keepalive handler that never detects pings
pub struct NoOpKeepalive;

impl KeepaliveResponder for NoOpKeepalive {
    fn is_ping(&self, _message: &str) -> bool {
        false
    }

    fn pong_response(&self, _message: &str) -> Option<String> {
        None
    }
}
