//! Protocol error types.

use thiserror::Error;

use crate::types::{MessageKind, Role};

/// Errors raised by the byte transport underneath a session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Fewer bytes than requested arrived before the deadline.
    #[error("timed out waiting for {expected} bytes, received {received}")]
    Timeout {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes that arrived in time.
        received: usize,
    },

    /// The peer closed the stream.
    #[error("connection closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error is a read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Errors that can occur when encoding, decoding, or exchanging messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A schema's declared payload size disagrees with its fields.
    #[error("inconsistent {role} schema for {kind}: declared {declared} bytes, fields need {actual}")]
    SchemaInconsistency {
        /// Message kind being registered.
        kind: MessageKind,
        /// Role being registered.
        role: Role,
        /// Declared payload size.
        declared: usize,
        /// Sum of the field widths.
        actual: usize,
    },

    /// The same kind and role were registered twice.
    #[error("{role} schema for {kind} registered twice")]
    DuplicateSchema {
        /// Message kind being registered.
        kind: MessageKind,
        /// Role being registered.
        role: Role,
    },

    /// No schema is registered for this kind and role.
    #[error("no {role} schema registered for {kind}")]
    UnknownMessageKind {
        /// Requested message kind.
        kind: MessageKind,
        /// Requested role.
        role: Role,
    },

    /// Supplied field names do not match the schema.
    #[error("field mismatch for {kind}: missing {missing:?}, unexpected {unexpected:?}")]
    FieldMismatch {
        /// Message kind being encoded.
        kind: MessageKind,
        /// Schema fields that were not supplied.
        missing: Vec<String>,
        /// Supplied fields the schema does not declare.
        unexpected: Vec<String>,
    },

    /// A value does not fit its field's width and signedness.
    #[error("value {value} does not fit field '{field}' ({min}..={max})")]
    FieldOverflow {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: i64,
        /// Smallest representable value.
        min: i64,
        /// Largest representable value.
        max: i64,
    },

    /// A decoded field could not be converted into a typed record.
    #[error("invalid value {value} for field '{field}'")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Decoded value.
        value: i64,
    },

    /// Reading or writing the link failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame is shorter than the schema requires.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Expected frame length.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Frame is longer than the schema allows.
    #[error("trailing bytes: expected {expected} bytes, got {actual}")]
    TrailingBytes {
        /// Expected frame length.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Frame does not start with the `$M` preamble.
    #[error("bad preamble: {actual:02X?}")]
    BadPreamble {
        /// The two bytes found instead.
        actual: [u8; 2],
    },

    /// Direction marker does not match the schema.
    #[error("bad direction marker: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadDirection {
        /// Marker the schema declares.
        expected: u8,
        /// Marker found in the frame.
        actual: u8,
    },

    /// Size byte does not match the schema's payload size.
    #[error("payload size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Schema payload size.
        expected: u8,
        /// Size byte from the frame.
        actual: u8,
    },

    /// Message id byte does not match the schema's kind.
    #[error("message id mismatch: expected {expected}, got {actual}")]
    MessageIdMismatch {
        /// Schema message id.
        expected: u8,
        /// Message id from the frame.
        actual: u8,
    },

    /// Recomputed checksum differs from the trailing byte.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },

    /// The device acknowledged a different message.
    #[error("received ACK for {got} but expected {want}")]
    UnexpectedAck {
        /// Acknowledged message id.
        got: MessageKind,
        /// Message id that was sent.
        want: MessageKind,
    },

    /// The device answered with an error frame.
    #[error("device rejected {kind}")]
    DeviceRejected {
        /// Message kind that was rejected.
        kind: MessageKind,
    },
}

impl ProtocolError {
    /// Whether the error was detected before any bytes were written.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownMessageKind { .. }
                | ProtocolError::FieldMismatch { .. }
                | ProtocolError::FieldOverflow { .. }
        )
    }

    /// Whether the error indicates a corrupted or misaligned frame.
    pub fn is_frame_corruption(&self) -> bool {
        matches!(
            self,
            ProtocolError::TruncatedFrame { .. }
                | ProtocolError::TrailingBytes { .. }
                | ProtocolError::BadPreamble { .. }
                | ProtocolError::BadDirection { .. }
                | ProtocolError::SizeMismatch { .. }
                | ProtocolError::MessageIdMismatch { .. }
                | ProtocolError::ChecksumMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::ChecksumMismatch {
            expected: 0x64,
            actual: 0x65,
        };
        assert_eq!(err.to_string(), "checksum mismatch: expected 0x64, got 0x65");

        let err = ProtocolError::UnexpectedAck {
            got: MessageKind::IDENT,
            want: MessageKind::SET_WP,
        };
        assert_eq!(err.to_string(), "received ACK for IDENT (100) but expected SET_WP (209)");

        let err = ProtocolError::BadDirection {
            expected: b'>',
            actual: b'<',
        };
        assert_eq!(
            err.to_string(),
            "bad direction marker: expected 0x3E, got 0x3C"
        );
    }

    #[test]
    fn test_error_classification() {
        let overflow = ProtocolError::FieldOverflow {
            field: "wp_no",
            value: 256,
            min: 0,
            max: 255,
        };
        assert!(overflow.is_caller_error());
        assert!(!overflow.is_frame_corruption());

        let size = ProtocolError::SizeMismatch {
            expected: 21,
            actual: 20,
        };
        assert!(size.is_frame_corruption());

        let timeout: ProtocolError = TransportError::Timeout {
            expected: 6,
            received: 0,
        }
        .into();
        assert!(matches!(timeout, ProtocolError::Transport(ref e) if e.is_timeout()));
    }
}
