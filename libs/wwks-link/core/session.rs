use crate::core::handshake::HandshakeProgress;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// State shared by the tasks serving one established connection
///
/// A new session is created on every successful connect, so handshake
/// flags never leak from one connection into the next. Stopping is a
/// one-way transition: whoever flips `running` first owns the teardown.
#[derive(Debug)]
pub struct Session {
    id: u64,
    running: AtomicBool,
    stop_signal: Notify,
    progress: HandshakeProgress,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            running: AtomicBool::new(true),
            stop_signal: Notify::new(),
            progress: HandshakeProgress::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the session, returning `true` if this call did it
    pub fn stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        if was_running {
            self.stop_signal.notify_waiters();
        }
        was_running
    }

    /// Resolve once the session has been stopped
    pub async fn stopped(&self) {
        loop {
            let notified = self.stop_signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    pub fn progress(&self) -> &HandshakeProgress {
        &self.progress
    }
}
