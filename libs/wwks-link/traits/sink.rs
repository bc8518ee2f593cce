use async_trait::async_trait;

/// Trait for anything that can transmit a protocol message
///
/// The handshake sequencer talks to the connection through this seam so it
/// can be exercised without a socket.
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    /// Send one message, returning whether it was fully written
    async fn send_message(&self, text: &str) -> bool;
}
