//! # wwks-link Manager
//!
//! Supervised reconnection for a robot link.

pub mod supervisor;

pub use supervisor::{PollingHandle, PollingOutcome, ReconnectSupervisor};
