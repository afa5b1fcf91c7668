//! Runner configuration.
//!
//! Settings load from an optional YAML file; command-line flags override
//! individual values afterwards.
//!
//! ```yaml
//! connect: 127.0.0.1:5760
//! reply_timeout_ms: 5000
//! wake_delay_secs: 15
//! ```

use std::path::Path;
use std::time::Duration;

use msplink_protocol::SessionConfig;
use serde::Deserialize;

use crate::error::RunnerError;

/// Default bridge address.
pub const DEFAULT_CONNECT: &str = "127.0.0.1:5760";

/// Link settings for the `msplink` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// `host:port` of the UART-over-TCP bridge.
    pub connect: String,
    /// Deadline for a complete reply frame.
    pub reply_timeout_ms: u64,
    /// Pause after connecting, for boards that reset when the port opens.
    pub wake_delay_secs: u64,
    /// Socket read timeout; bounds how late a deadline is noticed.
    pub poll_interval_ms: u64,
    /// Quiet period that ends a discard of stale input.
    pub drain_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        RunnerConfig {
            connect: DEFAULT_CONNECT.to_string(),
            reply_timeout_ms: session.reply_timeout.as_millis() as u64,
            wake_delay_secs: 0,
            poll_interval_ms: 20,
            drain_timeout_ms: session.drain_timeout.as_millis() as u64,
        }
    }
}

impl RunnerConfig {
    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| RunnerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Timeouts for the protocol session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }

    /// Socket read timeout. Never zero, which `TcpStream` rejects.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Pause between connecting and the first exchange.
    pub fn wake_delay(&self) -> Duration {
        Duration::from_secs(self.wake_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_session_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.session_config(), SessionConfig::default());
        assert_eq!(config.connect, DEFAULT_CONNECT);
        assert_eq!(config.wake_delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: RunnerConfig =
            serde_yaml::from_str("connect: 10.0.0.2:4000\nwake_delay_secs: 15\n").unwrap();
        assert_eq!(config.connect, "10.0.0.2:4000");
        assert_eq!(config.wake_delay(), Duration::from_secs(15));
        assert_eq!(config.reply_timeout_ms, 5000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_yaml::from_str::<RunnerConfig>("baud: 115200\n").is_err());
    }

    #[test]
    fn test_zero_poll_interval_clamped() {
        let config = RunnerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RunnerConfig::load("/nonexistent/msplink.yaml").unwrap_err();
        assert!(matches!(err, RunnerError::ConfigRead { .. }));
    }
}
