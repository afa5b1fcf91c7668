//! Protocol constants
//!
//! These constants define the framing bytes, message ids, and sizes used by
//! the MSP serial protocol spoken by the flight controller.

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Fixed two-byte preamble that starts every frame.
pub const MSP_PREAMBLE: [u8; 2] = *b"$M";
/// Direction marker for frames sent by the host.
pub const MSP_DIR_TO_DEVICE: u8 = b'<';
/// Direction marker for frames sent by the device.
pub const MSP_DIR_FROM_DEVICE: u8 = b'>';
/// Direction marker for device-reported failures.
pub const MSP_DIR_ERROR: u8 = b'!';

/// Offset of the payload size byte within a frame.
pub const MSP_SIZE_INDEX: usize = MSP_PREAMBLE.len() + 1;
/// Offset of the message id byte within a frame.
pub const MSP_ID_INDEX: usize = MSP_SIZE_INDEX + 1;
/// Header length: preamble + direction + size + message id.
pub const MSP_HEADER_SIZE: usize = MSP_ID_INDEX + 1;
/// Trailer length: the checksum byte.
pub const MSP_CHECKSUM_SIZE: usize = 1;
/// Bytes a frame carries besides its payload.
pub const MSP_FRAME_OVERHEAD: usize = MSP_HEADER_SIZE + MSP_CHECKSUM_SIZE;
/// Largest payload the one-byte size field can describe.
pub const MSP_MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

// ============================================================================
// Message ids
// ============================================================================

/// Set how often the device broadcasts RAW_GPS (custom firmware command).
pub const MSP_GPS_REPORT_INTERVAL: u8 = 50;
/// Identify the board and firmware.
pub const MSP_IDENT: u8 = 100;
/// GPS fix, position, and ground speed.
pub const MSP_RAW_GPS: u8 = 106;
/// Read a mission waypoint.
pub const MSP_GET_WP: u8 = 118;
/// Navigation state machine status.
pub const MSP_NAV_STATUS: u8 = 121;
/// Write a mission waypoint.
pub const MSP_SET_WP: u8 = 209;

// ============================================================================
// Link defaults
// ============================================================================

/// How long to wait for a complete reply frame.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);
/// Quiet period that ends an input drain.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
