//! Runner error types.

use std::path::PathBuf;

use msplink_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised while driving a device from the command line.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// An exchange with the device failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connecting to the bridge or reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid YAML for [`RunnerConfig`](crate::RunnerConfig).
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A line of a waypoint file could not be parsed.
    #[error("waypoint file line {line}: {message}")]
    WaypointParse { line: usize, message: String },

    /// A waypoint read back after upload differs from what was written.
    #[error("waypoint {wp_no} did not verify after upload")]
    VerifyMismatch { wp_no: u8 },
}

impl RunnerError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        RunnerError::WaypointParse {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msplink_protocol::MessageKind;

    #[test]
    fn test_protocol_error_is_transparent() {
        let err: RunnerError = ProtocolError::DeviceRejected {
            kind: MessageKind::SET_WP,
        }
        .into();
        assert_eq!(err.to_string(), "device rejected SET_WP (209)");
    }

    #[test]
    fn test_waypoint_parse_display() {
        let err = RunnerError::parse(3, "unknown action 'FLY'");
        assert_eq!(err.to_string(), "waypoint file line 3: unknown action 'FLY'");
    }
}
