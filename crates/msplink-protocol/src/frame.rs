//! Frame encoding/decoding utilities.
//!
//! Every MSP frame has the same shape; only the payload length varies and
//! it is always known in advance from the schema.
//!
//! ```text
//! +---+---+-----+------+----+-------------------+-----+
//! | $ | M | dir | size | id | payload[0..size]  | crc |
//! +---+---+-----+------+----+-------------------+-----+
//! ```
//!
//! `dir` is `<` (to device), `>` (from device) or `!` (device error).
//! `crc` is the XOR of `size`, `id` and every payload byte.

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::schema::{FieldSpec, MessageSchema};
use crate::types::{Decoded, Direction, Fields, Message, MessageKind};

/// XOR-fold of `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

/// The fixed five header bytes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Direction marker byte.
    pub marker: u8,
    /// Declared payload size.
    pub size: u8,
    /// Message id byte.
    pub message_id: u8,
}

impl FrameHeader {
    /// Parse and check the preamble of the first [`MSP_HEADER_SIZE`] bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < MSP_HEADER_SIZE {
            return Err(ProtocolError::TruncatedFrame {
                expected: MSP_HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[..MSP_PREAMBLE.len()] != MSP_PREAMBLE {
            return Err(ProtocolError::BadPreamble {
                actual: [data[0], data[1]],
            });
        }
        Ok(FrameHeader {
            marker: data[MSP_PREAMBLE.len()],
            size: data[MSP_SIZE_INDEX],
            message_id: data[MSP_ID_INDEX],
        })
    }

    /// Whether this is a device error frame.
    pub fn is_error(&self) -> bool {
        self.marker == MSP_DIR_ERROR
    }

    /// Length of the whole frame this header announces.
    pub fn frame_len(&self) -> usize {
        MSP_FRAME_OVERHEAD + self.size as usize
    }
}

/// Build a complete frame around an already serialized payload.
///
/// # Panics
///
/// Panics if `payload` is longer than [`MSP_MAX_PAYLOAD_SIZE`].
pub fn encode_frame(direction: Direction, kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    assert!(
        payload.len() <= MSP_MAX_PAYLOAD_SIZE,
        "payload of {} bytes does not fit the size byte",
        payload.len()
    );

    let mut buf = Vec::with_capacity(MSP_FRAME_OVERHEAD + payload.len());
    buf.put_slice(&MSP_PREAMBLE);
    buf.put_u8(direction.marker());
    buf.put_u8(payload.len() as u8);
    buf.put_u8(kind.id());
    buf.put_slice(payload);
    let crc = checksum(&buf[MSP_SIZE_INDEX..]);
    buf.put_u8(crc);
    buf
}

/// Serialize `fields` into the payload layout of `schema`.
///
/// The field names must match the schema exactly and every value must fit
/// its field.
pub fn encode_payload(schema: &MessageSchema, fields: &Fields) -> Result<Vec<u8>, ProtocolError> {
    check_field_names(schema, fields)?;

    let mut payload = Vec::with_capacity(schema.payload_size() as usize);
    for spec in schema.fields() {
        // Presence was checked above.
        let value = fields.get(spec.name()).unwrap_or_default();
        put_field(&mut payload, spec, value)?;
    }
    Ok(payload)
}

/// Encode a host-to-device frame for `schema`.
pub fn encode(schema: &MessageSchema, fields: &Fields) -> Result<Vec<u8>, ProtocolError> {
    if schema.direction() != Direction::ToDevice {
        return Err(ProtocolError::BadDirection {
            expected: MSP_DIR_TO_DEVICE,
            actual: schema.direction().marker(),
        });
    }
    let payload = encode_payload(schema, fields)?;
    Ok(encode_frame(Direction::ToDevice, schema.kind(), &payload))
}

/// Decode and verify a complete frame against `schema`.
///
/// Error frames (`!`) short-circuit to [`Decoded::DeviceError`] before any
/// payload check. Otherwise the size byte is checked before the buffer
/// length, so a frame that announces the wrong size is reported as
/// [`ProtocolError::SizeMismatch`] rather than truncated or padded.
pub fn decode(data: &[u8], schema: &MessageSchema) -> Result<Decoded, ProtocolError> {
    let header = FrameHeader::parse(data)?;

    let expected_marker = schema.direction().marker();
    if header.marker != expected_marker && !header.is_error() {
        return Err(ProtocolError::BadDirection {
            expected: expected_marker,
            actual: header.marker,
        });
    }

    if header.is_error() {
        if data.len() >= header.frame_len() {
            verify_checksum(&data[..header.frame_len()])?;
        }
        return Ok(Decoded::DeviceError {
            message_id: header.message_id,
        });
    }

    if header.size != schema.payload_size() {
        return Err(ProtocolError::SizeMismatch {
            expected: schema.payload_size(),
            actual: header.size,
        });
    }

    if header.message_id != schema.kind().id() {
        return Err(ProtocolError::MessageIdMismatch {
            expected: schema.kind().id(),
            actual: header.message_id,
        });
    }

    let frame_len = schema.frame_len();
    if data.len() < frame_len {
        return Err(ProtocolError::TruncatedFrame {
            expected: frame_len,
            actual: data.len(),
        });
    }
    if data.len() > frame_len {
        return Err(ProtocolError::TrailingBytes {
            expected: frame_len,
            actual: data.len(),
        });
    }

    verify_checksum(data)?;

    let mut payload = &data[MSP_HEADER_SIZE..frame_len - MSP_CHECKSUM_SIZE];
    let mut fields = Fields::new();
    for spec in schema.fields() {
        fields.insert(spec.name(), get_field(&mut payload, spec));
    }

    let direction = Direction::from_marker(header.marker).unwrap_or(schema.direction());
    Ok(Decoded::Message(Message::new(schema.kind(), direction, fields)))
}

fn verify_checksum(frame: &[u8]) -> Result<(), ProtocolError> {
    let (body, trailer) = frame.split_at(frame.len() - MSP_CHECKSUM_SIZE);
    let expected = checksum(&body[MSP_SIZE_INDEX..]);
    let actual = trailer[0];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

fn check_field_names(schema: &MessageSchema, fields: &Fields) -> Result<(), ProtocolError> {
    let missing: Vec<String> = schema
        .fields()
        .iter()
        .filter(|spec| !fields.contains(spec.name()))
        .map(|spec| spec.name().to_string())
        .collect();
    let unexpected: Vec<String> = fields
        .iter()
        .filter(|(name, _)| schema.field(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::FieldMismatch {
            kind: schema.kind(),
            missing,
            unexpected,
        })
    }
}

fn put_field(buf: &mut Vec<u8>, spec: &FieldSpec, value: i64) -> Result<(), ProtocolError> {
    if !spec.fits(value) {
        return Err(ProtocolError::FieldOverflow {
            field: spec.name(),
            value,
            min: spec.min(),
            max: spec.max(),
        });
    }

    // Range is checked, so truncating to the field width keeps the
    // two's complement bit pattern for signed values.
    match spec.width() {
        1 => buf.put_u8(value as u8),
        2 => buf.put_u16_le(value as u16),
        _ => buf.put_u32_le(value as u32),
    }
    Ok(())
}

fn get_field(payload: &mut &[u8], spec: &FieldSpec) -> i64 {
    match (spec.width(), spec.is_signed()) {
        (1, false) => payload.get_u8() as i64,
        (1, true) => payload.get_i8() as i64,
        (2, false) => payload.get_u16_le() as i64,
        (2, true) => payload.get_i16_le() as i64,
        (_, false) => payload.get_u32_le() as i64,
        (_, true) => payload.get_i32_le() as i64,
    }
}
