use crate::core::connection_state::{ConnectionError, ConnectionState};
use crate::traits::ConnectionObserver;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sends every diagnostic line to both `tracing` and the observer's log callback
#[derive(Clone)]
pub struct Reporter {
    observer: Arc<dyn ConnectionObserver>,
}

impl Reporter {
    pub fn new(observer: Arc<dyn ConnectionObserver>) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &Arc<dyn ConnectionObserver> {
        &self.observer
    }

    pub fn debug(&self, text: &str) {
        debug!("{}", text);
        self.observer.on_log(text);
    }

    pub fn info(&self, text: &str) {
        info!("{}", text);
        self.observer.on_log(text);
    }

    pub fn warn(&self, text: &str) {
        warn!("{}", text);
        self.observer.on_log(text);
    }

    pub fn error(&self, text: &str) {
        error!("{}", text);
        self.observer.on_log(text);
    }

    /// Announce a `ConnectionState` transition
    pub fn state_changed(&self, state: ConnectionState, error: ConnectionError, description: &str) {
        info!("Connection state: {} ({}): {}", state, error, description);
        self.observer.on_state_changed(state, error, description);
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}
