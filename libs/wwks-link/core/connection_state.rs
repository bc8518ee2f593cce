//! Connection state machines
//!
//! Two views of the same link are kept:
//!
//! - [`ConnectionState`] / [`ConnectionError`]: fine-grained, reported on
//!   every transition through `on_state_changed`
//! - [`NetworkConnectionState`]: the coarse 4-state machine behind the
//!   manual-retry UX

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Fine-grained connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection, not attempting
    NotConnected,
    /// Currently trying to connect
    Attempting,
    /// Socket open and receive loop running
    Connected,
    /// Last connection attempt failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Attempting => "Attempting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Classified cause of the last failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionError {
    None,
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    NetworkUnreachable,
    HostUnreachable,
    Other,
}

impl ConnectionError {
    /// Map a platform socket error onto the classification
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectionError::Timeout,
            io::ErrorKind::ConnectionRefused => ConnectionError::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ConnectionError::ConnectionReset,
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown => {
                ConnectionError::NetworkUnreachable
            }
            io::ErrorKind::HostUnreachable | io::ErrorKind::AddrNotAvailable => {
                ConnectionError::HostUnreachable
            }
            _ => ConnectionError::Other,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionError::None => "None",
            ConnectionError::Timeout => "Timeout",
            ConnectionError::ConnectionRefused => "ConnectionRefused",
            ConnectionError::ConnectionReset => "ConnectionReset",
            ConnectionError::NetworkUnreachable => "NetworkUnreachable",
            ConnectionError::HostUnreachable => "HostUnreachable",
            ConnectionError::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Coarse, consumer-facing connection state machine
///
/// `PausedWaitingForUser` is only ever left through
/// [`crate::PickupClient::set_network_state`] or an explicit `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NetworkConnectionState {
    /// Ready to connect (supervisor may attempt up to 10 times)
    ReadyToConnect = 0,
    /// Connected, kept alive by keepalive replies
    StayAlive = 1,
    /// Connection lost, being torn down
    IssueTerminate = 2,
    /// Supervisor gave up; waiting for the user to retry
    PausedWaitingForUser = 3,
}

impl NetworkConnectionState {
    /// Numeric value used by the presentation layer
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Self::as_u8`]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ReadyToConnect),
            1 => Some(Self::StayAlive),
            2 => Some(Self::IssueTerminate),
            3 => Some(Self::PausedWaitingForUser),
            _ => None,
        }
    }

    /// Label used in state-machine log lines
    pub fn label(self) -> &'static str {
        match self {
            Self::ReadyToConnect => "Disconnected_ReadyToConnect",
            Self::StayAlive => "Connected_StayAlive",
            Self::IssueTerminate => "ConnectionIssue_Terminate",
            Self::PausedWaitingForUser => "Disconnected_PausedWaitingForUser",
        }
    }
}

impl fmt::Display for NetworkConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
