//! Common types used in the protocol.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::*;

/// Identifies a message type. The value is the message id byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKind(pub u8);

impl MessageKind {
    /// Set the RAW_GPS broadcast interval.
    pub const GPS_REPORT_INTERVAL: MessageKind = MessageKind(MSP_GPS_REPORT_INTERVAL);
    /// Identify the board.
    pub const IDENT: MessageKind = MessageKind(MSP_IDENT);
    /// GPS fix and position.
    pub const RAW_GPS: MessageKind = MessageKind(MSP_RAW_GPS);
    /// Read a waypoint.
    pub const GET_WP: MessageKind = MessageKind(MSP_GET_WP);
    /// Navigation status.
    pub const NAV_STATUS: MessageKind = MessageKind(MSP_NAV_STATUS);
    /// Write a waypoint.
    pub const SET_WP: MessageKind = MessageKind(MSP_SET_WP);

    /// The message id byte.
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Symbolic name for the built-in kinds.
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            MSP_GPS_REPORT_INTERVAL => Some("GPS_REPORT_INTERVAL"),
            MSP_IDENT => Some("IDENT"),
            MSP_RAW_GPS => Some("RAW_GPS"),
            MSP_GET_WP => Some("GET_WP"),
            MSP_NAV_STATUS => Some("NAV_STATUS"),
            MSP_SET_WP => Some("SET_WP"),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "message {}", self.0),
        }
    }
}

impl From<u8> for MessageKind {
    fn from(id: u8) -> Self {
        MessageKind(id)
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind.0
    }
}

/// Which side sent a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to device (`<`).
    ToDevice,
    /// Device to host (`>`).
    FromDevice,
    /// Device-reported failure (`!`).
    Error,
}

impl Direction {
    /// The marker byte written at offset 2.
    pub const fn marker(self) -> u8 {
        match self {
            Direction::ToDevice => MSP_DIR_TO_DEVICE,
            Direction::FromDevice => MSP_DIR_FROM_DEVICE,
            Direction::Error => MSP_DIR_ERROR,
        }
    }

    /// Parse a marker byte.
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            MSP_DIR_TO_DEVICE => Some(Direction::ToDevice),
            MSP_DIR_FROM_DEVICE => Some(Direction::FromDevice),
            MSP_DIR_ERROR => Some(Direction::Error),
            _ => None,
        }
    }
}

/// The part a schema plays in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Host pushes settings; the device answers with an ack.
    Provide,
    /// Host queries; the device answers with a response.
    Request,
    /// Device reply to a request.
    Response,
    /// Unsolicited device frame.
    Broadcast,
    /// Zero-payload device reply to a provide.
    Ack,
}

impl Role {
    /// Direction every schema in this role travels.
    pub const fn direction(self) -> Direction {
        match self {
            Role::Provide | Role::Request => Direction::ToDevice,
            Role::Response | Role::Broadcast | Role::Ack => Direction::FromDevice,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Provide => "provide",
            Role::Request => "request",
            Role::Response => "response",
            Role::Broadcast => "broadcast",
            Role::Ack => "ack",
        };
        f.write_str(name)
    }
}

/// Field values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<&'static str, i64>);

impl Fields {
    /// Create an empty set of fields.
    pub fn new() -> Self {
        Fields(BTreeMap::new())
    }

    /// Set a field, returning `self` for chaining.
    pub fn with(mut self, name: &'static str, value: impl Into<i64>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, name: &'static str, value: impl Into<i64>) -> Option<i64> {
        self.0.insert(name, value.into())
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Whether a field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.0.iter().map(|(name, value)| (*name, *value))
    }
}

impl<V: Into<i64>, const N: usize> From<[(&'static str, V); N]> for Fields {
    fn from(pairs: [(&'static str, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<V: Into<i64>> FromIterator<(&'static str, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (&'static str, V)>>(iter: I) -> Self {
        Fields(iter.into_iter().map(|(name, value)| (name, value.into())).collect())
    }
}

/// A successfully decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    direction: Direction,
    fields: Fields,
}

impl Message {
    pub(crate) fn new(kind: MessageKind, direction: Direction, fields: Fields) -> Self {
        Message {
            kind,
            direction,
            fields,
        }
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Direction the frame travelled.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// All decoded fields.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// A single field value.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.fields.get(name)
    }

    /// Consume the message, keeping only its fields.
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// Result of decoding a frame that passed framing checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A normal frame matching the schema.
    Message(Message),
    /// The device reported a failure for this message id.
    DeviceError {
        /// Message id carried by the error frame.
        message_id: u8,
    },
}

impl Decoded {
    /// The decoded message, if this is not an error frame.
    pub fn into_message(self) -> Option<Message> {
        match self {
            Decoded::Message(message) => Some(message),
            Decoded::DeviceError { .. } => None,
        }
    }
}
