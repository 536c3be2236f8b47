//! Link configuration.
//!
//! One YAML document describes the radio peers, the optional Matlab bridge, the
//! flight record and the rig calibration. Every section and field has a default,
//! so an empty document yields a usable loopback configuration.
//!
//! ```yaml
//! radio:
//!   bind: 0.0.0.0:9750
//!   acm_node: 192.168.191.11:9750
//!   cmp_node: 192.168.191.12:9750
//! matlab:
//!   host: 127.0.0.1
//!   local_port: 9090
//!   remote_port: 9091
//! recording:
//!   path: flights/run42.dat
//! calibration:
//!   encoder_zero: [4964, 236, 0]
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::Calibration;
use crate::{LinkError, Result};

/// Radio application port used by the boards.
pub const RADIO_PORT: u16 = 0x2616;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub radio: RadioConfig,
    pub matlab: Option<MatlabConfig>,
    pub recording: RecordingConfig,
    pub dispatch: DispatchConfig,
    pub calibration: Calibration,
}

impl LinkConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the dispatch loop cannot run with.
    ///
    /// Calibration is deliberately not checked here; bad offsets only produce bad
    /// numbers.
    pub fn validate(&self) -> Result<()> {
        let d = &self.dispatch;
        if d.poll_timeout_ms == 0 {
            return Err(LinkError::Config { details: "dispatch.poll_timeout_ms must be > 0".into() });
        }
        if d.command_queue == 0 || d.gui_queue == 0 {
            return Err(LinkError::Config { details: "dispatch queue sizes must be > 0".into() });
        }
        if self.calibration.encoder_period <= 0 {
            return Err(LinkError::Config {
                details: "calibration.encoder_period must be positive".into(),
            });
        }
        if let Some(matlab) = &self.matlab
            && matlab.remote_port == u16::MAX
        {
            return Err(LinkError::Config {
                details: "matlab.remote_port leaves no room for the peer port".into(),
            });
        }
        Ok(())
    }
}

/// Radio socket and the two actuator board endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub bind: SocketAddr,
    /// Flight-surface board (receives 0xA5 packets)
    pub acm_node: SocketAddr,
    /// Compensator board (receives 0xA6 packets)
    pub cmp_node: SocketAddr,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), RADIO_PORT),
            acm_node: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 191, 11)), RADIO_PORT),
            cmp_node: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 191, 12)), RADIO_PORT),
        }
    }
}

/// Matlab co-simulation peer.
///
/// Requests arrive on `local_port`. Replies leave from `remote_port` towards
/// `remote_port + 1` on the same host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatlabConfig {
    pub host: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
}

impl MatlabConfig {
    pub fn rx_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.local_port)
    }

    pub fn tx_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.remote_port)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.remote_port.saturating_add(1))
    }
}

impl Default for MatlabConfig {
    fn default() -> Self {
        Self { host: IpAddr::V4(Ipv4Addr::LOCALHOST), local_port: 9090, remote_port: 9091 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Raw flight record; nothing is recorded when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bound on one wait of the running loop
    pub poll_timeout_ms: u64,
    /// Interval of the "waiting for start" log while not started
    pub start_poll_ms: u64,
    /// Operator command queue capacity
    pub command_queue: usize,
    /// Operator notification queue capacity
    pub gui_queue: usize,
    /// Minimum ADC-time gap between operator notifications
    pub notify_interval_us: i64,
}

impl DispatchConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn start_poll(&self) -> Duration {
        Duration::from_millis(self.start_poll_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 200,
            start_poll_ms: 1000,
            command_queue: 64,
            gui_queue: 64,
            notify_interval_us: crate::telemetry::DEFAULT_NOTIFY_INTERVAL_US,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = LinkConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, LinkConfig::default());
        assert_eq!(config.dispatch.poll_timeout(), Duration::from_millis(200));
        assert_eq!(config.radio.bind.port(), 9750);
        assert!(config.matlab.is_none());
        assert!(config.recording.path.is_none());
    }

    #[test]
    fn sections_parse_from_yaml() {
        let yaml = r#"
radio:
  bind: 127.0.0.1:7000
  acm_node: 127.0.0.1:7001
  cmp_node: 127.0.0.1:7002
matlab:
  local_port: 5000
  remote_port: 5001
recording:
  path: /tmp/run.dat
dispatch:
  poll_timeout_ms: 50
calibration:
  encoder_zero: [1, 2, 3]
"#;
        let config = LinkConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.radio.acm_node, "127.0.0.1:7001".parse().unwrap());
        let matlab = config.matlab.unwrap();
        assert_eq!(matlab.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(matlab.peer_addr().port(), 5002);
        assert_eq!(config.recording.path, Some(PathBuf::from("/tmp/run.dat")));
        assert_eq!(config.dispatch.poll_timeout_ms, 50);
        assert_eq!(config.dispatch.command_queue, 64);
        assert_eq!(config.calibration.encoder_zero, [1, 2, 3]);
        assert_eq!(config.calibration.encoder_period, 4096);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let err = LinkConfig::from_yaml_str("dispatch:\n  poll_timeout_ms: 0\n").unwrap_err();
        assert!(matches!(err, LinkError::Config { .. }));
        assert!(!err.is_retryable());

        let err = LinkConfig::from_yaml_str("radio: [1, 2]").unwrap_err();
        assert!(matches!(err, LinkError::Config { .. }));
    }

    #[test]
    fn missing_file_is_file_error() {
        let err = LinkConfig::from_path("/nonexistent/groundlink.yaml").unwrap_err();
        assert!(matches!(err, LinkError::File { .. }));
    }
}
