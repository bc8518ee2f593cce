//! Rowa pickup terminal - Main Library
//!
//! Connects a pickup terminal to a Rowa robot controller over the WWKS 2.0
//! protocol.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (configuration, logging, runner)
//! - **wwks_link**: Robot link library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use rowa_pickup::bin_common::{load_config_from_env, ConfigType, LinkSettings};
//! use rowa_pickup::wwks_link::PickupClient;
//! ```

// Re-export workspace libraries for convenience
pub use wwks_link;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Provides shared functionality for the presentation layer (binaries).

    pub mod cli;
    pub mod logging;
    pub mod runner;

    pub use cli::{load_client_config, load_config_from_env, ConfigError, ConfigType, LinkSettings};
    pub use logging::init_tracing;
    pub use runner::{execute, execute_until, BinaryRunner, RunConfig};
}
