//! Pickup Link
//!
//! Connects this terminal to a Rowa robot controller and logs everything
//! the robot sends. Falls back to supervised reconnection when the robot
//! is unreachable or drops the link.
//!
//! Environment (`.env` supported):
//! - `ROBOT_HOST`, `ROBOT_PORT`: robot endpoint (required)
//! - `SOURCE_NUMBER`, `TENANT_ID`, `STOCK_LOCATION`: terminal identity
//! - `PICKUP_CONFIG_PATH`: link configuration (default `config/pickup.yaml`)
//! - `RUST_LOG`: log filter
//!
//! Usage:
//!   cargo run --bin pickup_link

use anyhow::{Context, Result};
use rowa_pickup::bin_common::{
    execute, init_tracing, load_client_config, load_config_from_env, BinaryRunner, ConfigType,
    LinkSettings, RunConfig,
};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};
use wwks_link::{
    ClientConfig, ConnectionError, ConnectionObserver, ConnectionState, NetworkConnectionState,
    PickupClient,
};

/// State changes the main loop reacts to
#[derive(Debug)]
struct StateChange {
    state: ConnectionState,
    error: ConnectionError,
}

/// Logs inbound traffic and forwards state changes to the main loop
struct TerminalObserver {
    changes: UnboundedSender<StateChange>,
}

impl ConnectionObserver for TerminalObserver {
    fn on_message(&self, kind: &str, raw: &str) {
        if kind.is_empty() {
            info!("<<< connection ended");
        } else {
            info!("<<< {} ({} bytes)", kind, raw.len());
        }
    }

    fn on_state_changed(&self, state: ConnectionState, error: ConnectionError, description: &str) {
        info!("Link {} ({}): {}", state, error, description);
        let _ = self.changes.send(StateChange { state, error });
    }
}

struct PickupLinkApp {
    run_config: RunConfig,
    settings: LinkSettings,
    client: PickupClient,
    changes: UnboundedReceiver<StateChange>,
    reconnects: usize,
}

impl PickupLinkApp {
    fn new(settings: LinkSettings, config: ClientConfig) -> Result<Self> {
        let (tx, rx) = unbounded_channel();
        let client = PickupClient::new(config, Arc::new(TerminalObserver { changes: tx }))?;

        Ok(Self {
            run_config: RunConfig::new("Pickup Link")
                .with_status_interval(std::time::Duration::from_secs(30)),
            settings,
            client,
            changes: rx,
            reconnects: 0,
        })
    }

    /// Hand the endpoint to the reconnect supervisor
    ///
    /// Runs detached so a status tick never cancels it half way.
    fn restart_polling(&mut self) {
        let client = self.client.clone();
        let (host, port) = (self.settings.host.clone(), self.settings.port);
        self.reconnects += 1;
        tokio::spawn(async move {
            if !client.start_polling(&host, port).await {
                warn!("Could not start polling {}:{}", host, port);
            }
        });
    }
}

impl BinaryRunner for PickupLinkApp {
    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    async fn start(&mut self) -> Result<()> {
        let (host, port) = (self.settings.host.clone(), self.settings.port);
        info!("Robot endpoint: {}:{}", host, port);

        if !self.client.connect(&host, port).await {
            warn!("Initial connection failed, polling {}:{}", host, port);
            self.restart_polling();
        }
        Ok(())
    }

    async fn next_event(&mut self) -> bool {
        let Some(change) = self.changes.recv().await else {
            return false;
        };
        // The robot dropped an established link
        if change.state == ConnectionState::NotConnected
            && change.error != ConnectionError::None
            && !self.client.is_polling()
        {
            self.restart_polling();
        }
        if self.client.network_state() == NetworkConnectionState::PausedWaitingForUser {
            warn!("Reconnection paused: restart pickup_link to try again");
        }
        true
    }

    fn status(&self) -> String {
        let handshake = self.client.handshake_progress();
        format!(
            "link={} network={} polling={} hello={} status={} stock={} reconnects={}",
            self.client.connection_state(),
            self.client.network_state(),
            self.client.is_polling(),
            handshake.hello_acked,
            handshake.status_acked,
            handshake.complete,
            self.reconnects
        )
    }

    async fn stop(&mut self) {
        self.client.close().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("info");

    let settings = LinkSettings::from_env().context("Robot endpoint not configured")?;

    let config_path = load_config_from_env(ConfigType::Pickup);
    let config = if config_path.exists() {
        info!("Loading link configuration from {}", config_path.display());
        load_client_config(&config_path)?
    } else {
        info!(
            "No configuration at {}, using protocol defaults",
            config_path.display()
        );
        ClientConfig::default()
    };

    let mut app = PickupLinkApp::new(settings.clone(), settings.apply(config))?;
    execute(&mut app).await
}
