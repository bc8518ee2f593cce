//! Delivery of completed messages to the observer
//!
//! The receive loop never calls the observer directly. In ordered mode one
//! dispatcher thread per connection drains a crossbeam queue, so the
//! consumer sees messages in arrival order while socket reads continue.
//! Concurrent mode hands each message to its own blocking task and gives
//! no ordering guarantee.

use crate::core::config::DispatchMode;
use crate::core::reporter::Reporter;
use crate::traits::ConnectionObserver;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

struct Inbound {
    kind: String,
    raw: String,
}

/// Per-connection message dispatcher
pub struct Dispatcher {
    delivery: Delivery,
}

enum Delivery {
    Ordered {
        tx: Sender<Inbound>,
        thread: std::thread::JoinHandle<()>,
    },
    Concurrent {
        observer: Arc<dyn ConnectionObserver>,
        tasks: JoinSet<()>,
    },
}

impl Dispatcher {
    /// Start a dispatcher for one connection
    ///
    /// Falls back to concurrent delivery if the dispatcher thread cannot be
    /// spawned.
    pub fn start(mode: DispatchMode, reporter: &Reporter, session_id: u64) -> Self {
        let observer = Arc::clone(reporter.observer());

        if mode == DispatchMode::Ordered {
            let (tx, rx) = unbounded();
            let thread_observer = Arc::clone(&observer);
            let spawned = std::thread::Builder::new()
                .name(format!("wwks-dispatch-{}", session_id))
                .spawn(move || run_dispatcher(rx, thread_observer));

            match spawned {
                Ok(thread) => {
                    return Self {
                        delivery: Delivery::Ordered { tx, thread },
                    }
                }
                Err(e) => reporter.error(&format!(
                    "Failed to spawn dispatcher thread ({}), delivering concurrently",
                    e
                )),
            }
        }

        Self {
            delivery: Delivery::Concurrent {
                observer,
                tasks: JoinSet::new(),
            },
        }
    }

    /// Whether messages are delivered in arrival order
    pub fn is_ordered(&self) -> bool {
        matches!(self.delivery, Delivery::Ordered { .. })
    }

    /// Queue one message for delivery
    pub fn dispatch(&mut self, kind: String, raw: String) {
        match &mut self.delivery {
            Delivery::Ordered { tx, .. } => {
                if let Err(e) = tx.send(Inbound { kind, raw }) {
                    error!("Dispatcher thread has exited, dropping {}", e.0.kind);
                }
            }
            Delivery::Concurrent { observer, tasks } => {
                while let Some(finished) = tasks.try_join_next() {
                    log_join_error(finished);
                }
                let observer = Arc::clone(observer);
                tasks.spawn_blocking(move || deliver(observer.as_ref(), &kind, &raw));
            }
        }
    }

    /// Deliver everything still queued, then stop
    pub async fn finish(self) {
        match self.delivery {
            Delivery::Ordered { tx, thread } => {
                drop(tx);
                match tokio::task::spawn_blocking(move || thread.join()).await {
                    Ok(Ok(())) => debug!("Dispatcher thread finished"),
                    Ok(Err(_)) => error!("Dispatcher thread panicked"),
                    Err(e) => error!("Failed to join dispatcher thread: {}", e),
                }
            }
            Delivery::Concurrent { mut tasks, .. } => {
                while let Some(finished) = tasks.join_next().await {
                    log_join_error(finished);
                }
            }
        }
    }
}

fn run_dispatcher(rx: Receiver<Inbound>, observer: Arc<dyn ConnectionObserver>) {
    for Inbound { kind, raw } in rx.iter() {
        deliver(observer.as_ref(), &kind, &raw);
    }
}

fn deliver(observer: &dyn ConnectionObserver, kind: &str, raw: &str) {
    if catch_unwind(AssertUnwindSafe(|| observer.on_message(kind, raw))).is_err() {
        error!("Observer panicked while handling {:?}", kind);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Dispatch task failed: {}", e);
    }
}
