//! Three-step session setup
//!
//! After the socket opens the terminal identifies itself, asks for the
//! robot's status and finally requests the stock of its location:
//!
//! ```text
//! Client ──HelloRequest──────> Robot      Client <──HelloResponse──────  Robot   hello_acked
//! Client ──StatusRequest─────> Robot      Client <──StatusResponse─────  Robot   status_acked
//! Client ──StockInfoRequest──> Robot      Client <──StockInfoResponse──  Robot   complete
//! ```
//!
//! Each request after the first is only sent once the previous response
//! has arrived. [`HandshakeMode::FixedDelay`] checks at fixed times and
//! skips the step if the response is late; [`HandshakeMode::EventDriven`]
//! waits for the response, up to a per-step timeout.

use crate::core::config::{HandshakeIdentity, HandshakeMode, HandshakeTimings};
use crate::core::envelope::{self, MessageKind};
use crate::core::reporter::Reporter;
use crate::core::session::Session;
use crate::traits::MessageSink;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// A step of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    Hello,
    Status,
    StockInfo,
}

impl HandshakeStep {
    /// The step a received message acknowledges, if any
    pub fn acknowledged_by(kind: &MessageKind) -> Option<Self> {
        match kind {
            MessageKind::HelloResponse => Some(Self::Hello),
            MessageKind::StatusResponse => Some(Self::Status),
            MessageKind::StockInfoResponse => Some(Self::StockInfo),
            _ => None,
        }
    }

    pub fn request_name(&self) -> &'static str {
        match self {
            Self::Hello => "HelloRequest",
            Self::Status => "StatusRequest",
            Self::StockInfo => "StockInfoRequest",
        }
    }

    pub fn response_name(&self) -> &'static str {
        match self {
            Self::Hello => "HelloResponse",
            Self::Status => "StatusResponse",
            Self::StockInfo => "StockInfoResponse",
        }
    }

    /// Build this step's request for `identity`
    pub fn request(&self, identity: &HandshakeIdentity) -> String {
        match self {
            Self::Hello => hello_request(identity),
            Self::Status => status_request(identity),
            Self::StockInfo => stock_info_request(identity),
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.request_name())
    }
}

/// Acknowledgement flags for one connection
///
/// Flags only ever go from false to true.
#[derive(Debug, Default)]
pub struct HandshakeProgress {
    hello_acked: AtomicBool,
    status_acked: AtomicBool,
    complete: AtomicBool,
    changed: Notify,
}

/// Point-in-time copy of [`HandshakeProgress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandshakeSnapshot {
    pub hello_acked: bool,
    pub status_acked: bool,
    pub complete: bool,
}

impl HandshakeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, step: HandshakeStep) -> &AtomicBool {
        match step {
            HandshakeStep::Hello => &self.hello_acked,
            HandshakeStep::Status => &self.status_acked,
            HandshakeStep::StockInfo => &self.complete,
        }
    }

    #[inline]
    pub fn is_acked(&self, step: HandshakeStep) -> bool {
        self.flag(step).load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.is_acked(HandshakeStep::StockInfo)
    }

    /// Set a step's flag, returning `true` if it was not set before
    pub fn acknowledge(&self, step: HandshakeStep) -> bool {
        let newly_set = !self.flag(step).swap(true, Ordering::AcqRel);
        if newly_set {
            self.changed.notify_waiters();
        }
        newly_set
    }

    /// Update the flags for a received message
    ///
    /// Returns the step that became acknowledged, if any.
    pub fn record(&self, kind: &MessageKind) -> Option<HandshakeStep> {
        HandshakeStep::acknowledged_by(kind).filter(|step| self.acknowledge(*step))
    }

    pub fn snapshot(&self) -> HandshakeSnapshot {
        HandshakeSnapshot {
            hello_acked: self.is_acked(HandshakeStep::Hello),
            status_acked: self.is_acked(HandshakeStep::Status),
            complete: self.is_complete(),
        }
    }

    /// Wait until `step` is acknowledged, giving up after `timeout`
    pub async fn wait_for(&self, step: HandshakeStep, timeout: Duration) -> bool {
        let acked = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.is_acked(step) {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, acked).await.is_ok()
    }
}

/// How a handshake run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// All three requests sent (fixed delay)
    RequestsSent,
    /// All three responses received (event driven)
    Completed,
    /// Step not sent because the previous response had not arrived
    Skipped(HandshakeStep),
    /// Previous response did not arrive within the step timeout
    TimedOut(HandshakeStep),
    /// Request could not be written
    SendFailed(HandshakeStep),
    /// Connection ended first
    Aborted,
}

/// Drives the handshake for one connection
pub struct HandshakeSequencer<S: MessageSink> {
    sink: Arc<S>,
    session: Arc<Session>,
    identity: HandshakeIdentity,
    mode: HandshakeMode,
    reporter: Reporter,
}

impl<S: MessageSink> HandshakeSequencer<S> {
    pub fn new(
        sink: Arc<S>,
        session: Arc<Session>,
        identity: HandshakeIdentity,
        mode: HandshakeMode,
        reporter: Reporter,
    ) -> Self {
        Self {
            sink,
            session,
            identity,
            mode,
            reporter,
        }
    }

    pub async fn run(self) -> HandshakeOutcome {
        let outcome = match self.mode {
            HandshakeMode::FixedDelay(timings) => self.run_fixed(timings).await,
            HandshakeMode::EventDriven { step_timeout } => self.run_event_driven(step_timeout).await,
        };
        self.reporter
            .debug(&format!("[HANDSHAKE] Sequence finished: {:?}", outcome));
        outcome
    }

    async fn run_fixed(&self, timings: HandshakeTimings) -> HandshakeOutcome {
        let steps = [
            (HandshakeStep::Hello, timings.hello_delay, None),
            (HandshakeStep::Status, timings.status_delay, Some(HandshakeStep::Hello)),
            (HandshakeStep::StockInfo, timings.stock_delay, Some(HandshakeStep::Status)),
        ];

        for (step, delay, requires) in steps {
            if !self.pause(delay).await {
                return HandshakeOutcome::Aborted;
            }
            if let Some(previous) = requires {
                if !self.session.progress().is_acked(previous) {
                    self.reporter.warn(&format!(
                        "[HANDSHAKE] {} not received, skipping {}",
                        previous.response_name(),
                        step
                    ));
                    return HandshakeOutcome::Skipped(step);
                }
            }
            if !self.send(step).await {
                return HandshakeOutcome::SendFailed(step);
            }
        }

        HandshakeOutcome::RequestsSent
    }

    async fn run_event_driven(&self, step_timeout: Duration) -> HandshakeOutcome {
        for step in [HandshakeStep::Hello, HandshakeStep::Status, HandshakeStep::StockInfo] {
            if !self.session.is_running() {
                return HandshakeOutcome::Aborted;
            }
            if !self.send(step).await {
                return HandshakeOutcome::SendFailed(step);
            }

            let acked = tokio::select! {
                acked = self.session.progress().wait_for(step, step_timeout) => acked,
                _ = self.session.stopped() => return HandshakeOutcome::Aborted,
            };
            if !acked {
                self.reporter.warn(&format!(
                    "[HANDSHAKE] {} not received within {:?}, abandoning handshake",
                    step.response_name(),
                    step_timeout
                ));
                return HandshakeOutcome::TimedOut(step);
            }
        }

        HandshakeOutcome::Completed
    }

    /// Sleep unless the session stops first
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.session.is_running(),
            _ = self.session.stopped() => false,
        }
    }

    async fn send(&self, step: HandshakeStep) -> bool {
        self.reporter.info(&format!("[HANDSHAKE] Sending {}", step));
        let sent = self.sink.send_message(&step.request(&self.identity)).await;
        if !sent {
            self.reporter.warn(&format!("[HANDSHAKE] Failed to send {}", step));
        }
        sent
    }
}

/// Identification request announcing this terminal and its capabilities
pub fn hello_request(identity: &HandshakeIdentity) -> String {
    let tenant = identity
        .tenant_id
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!(" TenantId=\"{}\"", t))
        .unwrap_or_default();
    let capabilities: String = identity
        .capabilities
        .iter()
        .map(|c| format!("<Capability Name=\"{}\" />", c))
        .collect();

    envelope::wrap(&format!(
        "<HelloRequest Id=\"{}\"><Subscriber Id=\"{}\" Type=\"{}\" Manufacturer=\"{}\" ProductInfo=\"{}\" VersionInfo=\"{}\"{}>{}</Subscriber></HelloRequest>",
        envelope::message_id(),
        identity.subscriber_id,
        identity.subscriber_type,
        identity.manufacturer,
        identity.product_info,
        identity.version_info,
        tenant,
        capabilities
    ))
}

pub fn status_request(identity: &HandshakeIdentity) -> String {
    envelope::wrap(&format!(
        "<StatusRequest Id=\"{}\" Source=\"{}\" IncludeDetails=\"True\" />",
        envelope::message_id(),
        identity.subscriber_id
    ))
}

pub fn stock_info_request(identity: &HandshakeIdentity) -> String {
    envelope::wrap(&format!(
        "<StockInfoRequest Id=\"{}\" Source=\"{}\" Destination=\"{}\" IncludePacks=\"False\" IncludeArticleDetails=\"False\"><Criteria StockLocationId=\"{}\" /></StockInfoRequest>",
        envelope::message_id(),
        identity.subscriber_id,
        identity.destination,
        identity.stock_location_id
    ))
}
