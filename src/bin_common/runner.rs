//! Event loop shared by long-running binaries
//!
//! ```text
//! start() ──> loop { shutdown signal | status tick | next_event() } ──> stop()
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Interval between `[STATUS]` lines
    pub status_interval: Duration,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_interval: Duration::from_secs(60),
        }
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }
}

/// A binary driven by [`execute`]
pub trait BinaryRunner {
    fn config(&self) -> &RunConfig;

    /// Bring the application up
    async fn start(&mut self) -> anyhow::Result<()>;

    /// Wait for and handle the next application event
    ///
    /// Returning `false` ends the loop.
    async fn next_event(&mut self) -> bool;

    /// One-line status, logged periodically and on shutdown
    fn status(&self) -> String;

    /// Release everything before exit
    async fn stop(&mut self);
}

/// Run `app` until Ctrl+C
pub async fn execute<R: BinaryRunner>(app: &mut R) -> anyhow::Result<()> {
    execute_until(app, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Run `app` until `shutdown` resolves or the app ends the loop
pub async fn execute_until<R, F>(app: &mut R, shutdown: F) -> anyhow::Result<()>
where
    R: BinaryRunner,
    F: Future<Output = ()>,
{
    let name = app.config().name.clone();
    info!("========================================");
    info!("Starting {} (Ctrl+C to stop)", name);
    info!("========================================");

    app.start().await?;

    let mut status = tokio::time::interval(app.config().status_interval);
    status.tick().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = status.tick() => info!("[STATUS] {}", app.status()),
            keep_going = app.next_event() => {
                if !keep_going {
                    break;
                }
            }
        }
    }

    app.stop().await;
    info!("{} stopped: {}", name, app.status());
    Ok(())
}
