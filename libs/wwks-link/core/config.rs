use crate::core::envelope::CLOSING_TAG;
use crate::traits::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`crate::PickupClient`]
///
/// Defaults are the robot link's protocol constants. Every field can be
/// overridden through the `with_*` methods or loaded from YAML, where
/// durations are given in milliseconds:
///
/// ```yaml
/// read_timeout_ms: 10000
/// max_consecutive_timeouts: 12
/// handshake:
///   mode: event_driven
///   step_timeout_ms: 2000
/// identity:
///   subscriber_id: 100
///   stock_location_id: "RowaA"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for a single socket read
    #[serde(rename = "read_timeout_ms", with = "duration_ms")]
    pub read_timeout: Duration,

    /// Consecutive read timeouts after which the peer is considered dead
    pub max_consecutive_timeouts: u32,

    /// Timeout for establishing the TCP connection
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Size of a single socket read
    pub read_buffer_size: usize,

    /// Cap on unterminated inbound bytes (`None` = unbounded)
    pub max_buffered_bytes: Option<usize>,

    /// Wait between reconnect attempts
    #[serde(rename = "reconnect_interval_ms", with = "duration_ms")]
    pub reconnect_interval: Duration,

    /// Reconnect attempts before pausing for the user
    pub max_reconnect_attempts: usize,

    /// Slice in which the reconnect wait checks for a stop request
    #[serde(rename = "stop_poll_interval_ms", with = "duration_ms")]
    pub stop_poll_interval: Duration,

    /// Literal closing tag that terminates each message
    pub delimiter: String,

    pub handshake: HandshakeMode,
    pub dispatch: DispatchMode,
    pub identity: HandshakeIdentity,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            max_consecutive_timeouts: 12,
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: 8192,
            max_buffered_bytes: None,
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            stop_poll_interval: Duration::from_millis(100),
            delimiter: CLOSING_TAG.to_string(),
            handshake: HandshakeMode::default(),
            dispatch: DispatchMode::default(),
            identity: HandshakeIdentity::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_consecutive_timeouts(mut self, count: u32) -> Self {
        self.max_consecutive_timeouts = count;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_max_buffered_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_buffered_bytes = limit;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_stop_poll_interval(mut self, interval: Duration) -> Self {
        self.stop_poll_interval = interval;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_handshake(mut self, mode: HandshakeMode) -> Self {
        self.handshake = mode;
        self
    }

    pub fn with_dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    pub fn with_identity(mut self, identity: HandshakeIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Time of silence after which the peer is declared dead
    pub fn stale_after(&self) -> Duration {
        self.read_timeout * self.max_consecutive_timeouts
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(LinkError::Configuration("read_timeout must be non-zero".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(LinkError::Configuration("connect_timeout must be non-zero".into()));
        }
        if self.stop_poll_interval.is_zero() {
            return Err(LinkError::Configuration("stop_poll_interval must be non-zero".into()));
        }
        if self.max_consecutive_timeouts == 0 {
            return Err(LinkError::Configuration(
                "max_consecutive_timeouts must be at least 1".into(),
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(LinkError::Configuration(
                "max_reconnect_attempts must be at least 1".into(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(LinkError::Configuration("read_buffer_size must be non-zero".into()));
        }
        if self.delimiter.is_empty() {
            return Err(LinkError::Configuration("delimiter must not be empty".into()));
        }
        if self.max_buffered_bytes == Some(0) {
            return Err(LinkError::Configuration(
                "max_buffered_bytes must be non-zero when set".into(),
            ));
        }
        if let HandshakeMode::EventDriven { step_timeout } = self.handshake {
            if step_timeout.is_zero() {
                return Err(LinkError::Configuration(
                    "handshake step_timeout must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }
}

/// How the three-step handshake is paced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HandshakeMode {
    /// Fixed waits before each step; a step is skipped if the previous
    /// acknowledgement has not arrived when its wait elapses
    FixedDelay(HandshakeTimings),

    /// Each step is sent as soon as the previous one is acknowledged;
    /// the sequence is abandoned if an acknowledgement takes longer than
    /// `step_timeout`
    EventDriven {
        #[serde(rename = "step_timeout_ms", with = "duration_ms")]
        step_timeout: Duration,
    },
}

impl Default for HandshakeMode {
    fn default() -> Self {
        Self::FixedDelay(HandshakeTimings::default())
    }
}

/// Waits used by [`HandshakeMode::FixedDelay`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeTimings {
    /// Before the identification request
    #[serde(rename = "hello_delay_ms", with = "duration_ms")]
    pub hello_delay: Duration,
    /// Before the status query
    #[serde(rename = "status_delay_ms", with = "duration_ms")]
    pub status_delay: Duration,
    /// Before the stock query
    #[serde(rename = "stock_delay_ms", with = "duration_ms")]
    pub stock_delay: Duration,
}

impl Default for HandshakeTimings {
    fn default() -> Self {
        Self {
            hello_delay: Duration::from_millis(100),
            status_delay: Duration::from_millis(600),
            stock_delay: Duration::from_millis(600),
        }
    }
}

/// How completed messages reach the observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One dispatcher thread per connection, arrival order preserved
    #[default]
    Ordered,
    /// One blocking task per message, no ordering guarantee
    Concurrent,
}

/// Who this terminal is, as announced in the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeIdentity {
    /// Subscriber id, also used as `Source` on requests
    pub subscriber_id: u32,
    pub tenant_id: Option<String>,
    /// Stock location queried after the status exchange
    pub stock_location_id: String,
    /// `Destination` of the stock query
    pub destination: u32,
    pub subscriber_type: String,
    pub manufacturer: String,
    pub product_info: String,
    pub version_info: String,
    pub capabilities: Vec<String>,
}

impl Default for HandshakeIdentity {
    fn default() -> Self {
        Self {
            subscriber_id: 100,
            tenant_id: None,
            stock_location_id: String::new(),
            destination: 999,
            subscriber_type: "IMS".to_string(),
            manufacturer: "Becton Dickenson Netherlands".to_string(),
            product_info: "RowaPickupSlim".to_string(),
            version_info: "1.0".to_string(),
            capabilities: ["KeepAlive", "Status", "StockInfo", "Output", "TaskInfo"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl HandshakeIdentity {
    pub fn with_subscriber_id(mut self, id: u32) -> Self {
        self.subscriber_id = id;
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id.filter(|t| !t.is_empty());
        self
    }

    pub fn with_stock_location_id(mut self, location: impl Into<String>) -> Self {
        self.stock_location_id = location.into();
        self
    }
}

/// Serde adapter storing a `Duration` as whole milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.max_consecutive_timeouts, 12);
        assert_eq!(config.stale_after(), Duration::from_secs(120));
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.delimiter, "</WWKS>");
        assert_eq!(config.max_buffered_bytes, None);
        assert_eq!(config.dispatch, DispatchMode::Ordered);
        assert_eq!(config.handshake, HandshakeMode::FixedDelay(HandshakeTimings::default()));
        assert_eq!(config.identity.subscriber_id, 100);
        assert_eq!(config.identity.destination, 999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::default()
            .with_read_timeout(Duration::from_millis(50))
            .with_max_consecutive_timeouts(3)
            .with_max_buffered_bytes(Some(1024))
            .with_dispatch(DispatchMode::Concurrent)
            .with_identity(HandshakeIdentity::default().with_tenant_id(Some(String::new())));

        assert_eq!(config.stale_after(), Duration::from_millis(150));
        assert_eq!(config.max_buffered_bytes, Some(1024));
        assert_eq!(config.dispatch, DispatchMode::Concurrent);
        assert_eq!(config.identity.tenant_id, None);
    }

    #[test]
    fn test_validation_rejects_degenerate_values() {
        let cases = [
            ClientConfig::default().with_read_timeout(Duration::ZERO),
            ClientConfig::default().with_max_consecutive_timeouts(0),
            ClientConfig::default().with_max_reconnect_attempts(0),
            ClientConfig::default().with_delimiter(""),
            ClientConfig::default().with_max_buffered_bytes(Some(0)),
            ClientConfig::default().with_handshake(HandshakeMode::EventDriven {
                step_timeout: Duration::ZERO,
            }),
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(LinkError::Configuration(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
read_timeout_ms: 2500
max_buffered_bytes: 65536
dispatch: concurrent
handshake:
  mode: event_driven
  step_timeout_ms: 2000
identity:
  subscriber_id: 7
  tenant_id: "site-1"
  stock_location_id: "RowaA"
"#;
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.read_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_consecutive_timeouts, 12);
        assert_eq!(config.max_buffered_bytes, Some(65536));
        assert_eq!(config.dispatch, DispatchMode::Concurrent);
        assert_eq!(
            config.handshake,
            HandshakeMode::EventDriven { step_timeout: Duration::from_millis(2000) }
        );
        assert_eq!(config.identity.subscriber_id, 7);
        assert_eq!(config.identity.tenant_id.as_deref(), Some("site-1"));
        assert_eq!(config.identity.manufacturer, "Becton Dickenson Netherlands");
    }

    #[test]
    fn test_yaml_fixed_delay_timings() {
        let yaml = "handshake:\n  mode: fixed_delay\n  status_delay_ms: 50\n";
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        let HandshakeMode::FixedDelay(timings) = config.handshake else {
            panic!("expected fixed delay");
        };
        assert_eq!(timings.hello_delay, Duration::from_millis(100));
        assert_eq!(timings.status_delay, Duration::from_millis(50));
    }
}
