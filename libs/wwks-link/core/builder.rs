use crate::core::client::PickupClient;
use crate::core::config::ClientConfig;
use crate::traits::*;
use std::sync::Arc;

/// Builder for [`PickupClient`]
///
/// Everything is optional: the default configuration, a no-op observer
/// and the WWKS keepalive responder are used when nothing is set.
pub struct PickupClientBuilder {
    config: ClientConfig,
    observer: Option<Arc<dyn ConnectionObserver>>,
    keepalive: Option<Arc<dyn KeepaliveResponder>>,
}

impl PickupClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            observer: None,
            keepalive: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Receiver of messages, logs and state changes
    pub fn observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the keepalive responder (e.g. [`NoOpKeepalive`] to pass pings through)
    pub fn keepalive(mut self, keepalive: impl KeepaliveResponder + 'static) -> Self {
        self.keepalive = Some(Arc::new(keepalive));
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> Result<PickupClient> {
        self.config.validate()?;

        Ok(PickupClient::from_parts(
            self.config,
            self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
            self.keepalive.unwrap_or_else(|| Arc::new(WwksKeepalive)),
        ))
    }
}

impl Default for PickupClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
