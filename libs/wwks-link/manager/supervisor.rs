use crate::traits::{Reconnectable, ReconnectionStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingOutcome {
    /// A connection is up (made by this run or already present)
    Connected { attempts: usize },
    /// Every allowed attempt failed
    ///
    /// Reported once the wait after the last failed attempt has elapsed,
    /// so a full run takes `attempts` retry intervals.
    Exhausted { attempts: usize },
    /// Stopped from outside, including during the wait after the last attempt
    Stopped { attempts: usize },
}

impl PollingOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            Self::Connected { attempts }
            | Self::Exhausted { attempts }
            | Self::Stopped { attempts } => *attempts,
        }
    }
}

/// Background retry loop driving a [`Reconnectable`] target
///
/// ```text
/// loop:
///   connected already?  -> Connected
///   attempts exhausted? -> on_exhausted(), Exhausted
///   attempt connect     -> success: Connected
///   wait interval in poll slices (stop request -> Stopped), also after the last attempt
/// ```
pub struct ReconnectSupervisor<T: Reconnectable> {
    target: Arc<T>,
    host: String,
    port: i32,
    strategy: Box<dyn ReconnectionStrategy>,
    poll_interval: Duration,
    active: Arc<AtomicBool>,
}

impl<T: Reconnectable> ReconnectSupervisor<T> {
    pub fn new(
        target: Arc<T>,
        host: impl Into<String>,
        port: i32,
        strategy: Box<dyn ReconnectionStrategy>,
    ) -> Self {
        Self {
            target,
            host: host.into(),
            port,
            strategy,
            poll_interval: Duration::from_millis(100),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Slice in which the retry wait checks for a stop request
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run on a tokio task
    pub fn spawn(self) -> PollingHandle {
        let active = Arc::clone(&self.active);
        let task = tokio::spawn(self.run());
        PollingHandle { active, task }
    }

    /// Run to completion on the current task
    pub async fn run(self) -> PollingOutcome {
        let outcome = self.poll().await;
        self.active.store(false, Ordering::Release);
        outcome
    }

    fn max_label(&self) -> String {
        self.strategy
            .max_attempts()
            .map_or_else(|| "unlimited".to_string(), |max| max.to_string())
    }

    async fn poll(&self) -> PollingOutcome {
        let mut attempts = 0;
        let max = self.max_label();

        self.target.log(&format!(
            "Connection polling started: will attempt {} times, {:?} apart",
            max,
            self.strategy.next_delay(0).unwrap_or_default()
        ));

        loop {
            if !self.active.load(Ordering::Acquire) {
                self.target.log("Connection polling was stopped");
                return PollingOutcome::Stopped { attempts };
            }

            if self.target.is_connected() {
                self.target
                    .log("Connection polling succeeded - connection established!");
                return PollingOutcome::Connected { attempts };
            }

            if !self.strategy.should_reconnect(attempts) {
                break;
            }

            attempts += 1;
            self.target.log(&format!(
                "Polling attempt {}/{} - Trying to connect to {}:{}",
                attempts, max, self.host, self.port
            ));

            if self.target.connect(&self.host, self.port).await {
                self.target.log(&format!(
                    "SUCCESS: Connection established during polling attempt {}",
                    attempts
                ));
                return PollingOutcome::Connected { attempts };
            }

            // Every failed attempt is followed by its wait, the last one included
            let delay = self.strategy.next_delay(attempts - 1).unwrap_or_default();

            self.target.log(&format!(
                "  Attempt {} failed, waiting {:?} before retry...",
                attempts, delay
            ));

            if !self.interruptible_sleep(delay).await {
                self.target.log("Connection polling was stopped");
                return PollingOutcome::Stopped { attempts };
            }
        }

        self.target.log(&format!(
            "Connection polling stopped: maximum {} attempts reached without success",
            max
        ));
        self.target.on_exhausted(attempts);
        PollingOutcome::Exhausted { attempts }
    }

    /// Sleep for `duration`, returning `false` if stopped meanwhile
    async fn interruptible_sleep(&self, duration: Duration) -> bool {
        let mut elapsed = Duration::ZERO;

        while elapsed < duration {
            if !self.active.load(Ordering::Acquire) {
                return false;
            }

            let sleep_time = std::cmp::min(self.poll_interval, duration - elapsed);
            tokio::time::sleep(sleep_time).await;
            elapsed += sleep_time;
        }

        self.active.load(Ordering::Acquire)
    }
}

/// Handle to a running supervisor
pub struct PollingHandle {
    active: Arc<AtomicBool>,
    task: JoinHandle<PollingOutcome>,
}

impl PollingHandle {
    /// Whether the supervisor is still trying
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.task.is_finished()
    }

    /// Request a stop and wait for the supervisor to exit
    pub async fn stop(self) -> Option<PollingOutcome> {
        self.active.store(false, Ordering::Release);
        self.join().await
    }

    /// Wait for the supervisor to finish on its own
    pub async fn join(self) -> Option<PollingOutcome> {
        match self.task.await {
            Ok(outcome) => {
                debug!("Polling finished: {:?}", outcome);
                Some(outcome)
            }
            Err(e) => {
                error!("Polling task failed: {}", e);
                None
            }
        }
    }
}
