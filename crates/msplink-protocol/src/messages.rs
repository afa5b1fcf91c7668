//! Typed records for the built-in message kinds.
//!
//! The session works on [`Fields`] maps so that kinds registered at runtime
//! can be exchanged too. For the built-in kinds these records give
//! compile-time field names and types on top of that.

use crate::error::ProtocolError;
use crate::types::{Fields, Message, MessageKind};

/// A settings push answered by an ack.
pub trait Settings {
    /// Kind the record is provided as.
    const KIND: MessageKind;

    /// Field values for the provide schema.
    fn to_fields(&self) -> Fields;
}

/// A record decoded from a response or broadcast.
pub trait Reply: Sized {
    /// Kind the record is decoded from.
    const KIND: MessageKind;

    /// Convert a decoded message.
    fn from_message(message: &Message) -> Result<Self, ProtocolError>;
}

/// A request whose response decodes into a known record.
pub trait Query {
    /// Record the device answers with.
    type Reply: Reply;

    /// Request parameters; empty for zero-payload requests.
    fn params(&self) -> Fields {
        Fields::new()
    }
}

fn check_kind(message: &Message, kind: MessageKind) -> Result<(), ProtocolError> {
    if message.kind() != kind {
        return Err(ProtocolError::MessageIdMismatch {
            expected: kind.id(),
            actual: message.kind().id(),
        });
    }
    Ok(())
}

fn field<T: TryFrom<i64>>(message: &Message, name: &'static str) -> Result<T, ProtocolError> {
    let value = message
        .get(name)
        .ok_or_else(|| ProtocolError::FieldMismatch {
            kind: message.kind(),
            missing: vec![name.to_string()],
            unexpected: Vec::new(),
        })?;
    T::try_from(value).map_err(|_| ProtocolError::InvalidField { field: name, value })
}

// ============================================================================
// Waypoints
// ============================================================================

/// One mission step, written with SET_WP and read back with GET_WP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Waypoint {
    /// Waypoint number (0 is home).
    pub wp_no: u8,
    /// Mission action code.
    pub action: u8,
    /// Latitude in degrees * 1e7.
    pub lat: i32,
    /// Longitude in degrees * 1e7.
    pub lon: i32,
    /// Altitude in centimetres.
    pub altitude: u32,
    /// Action parameter 1.
    pub param1: u16,
    /// Action parameter 2.
    pub param2: u16,
    /// Action parameter 3.
    pub param3: u16,
    /// Mission flag.
    pub flag: u8,
}

impl Settings for Waypoint {
    const KIND: MessageKind = MessageKind::SET_WP;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("wp_no", self.wp_no)
            .with("action", self.action)
            .with("lat", self.lat)
            .with("lon", self.lon)
            .with("altitude", self.altitude)
            .with("param1", self.param1)
            .with("param2", self.param2)
            .with("param3", self.param3)
            .with("flag", self.flag)
    }
}

impl Reply for Waypoint {
    const KIND: MessageKind = MessageKind::GET_WP;

    fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        check_kind(message, <Self as Reply>::KIND)?;
        Ok(Waypoint {
            wp_no: field(message, "wp_no")?,
            action: field(message, "action")?,
            lat: field(message, "lat")?,
            lon: field(message, "lon")?,
            altitude: field(message, "altitude")?,
            param1: field(message, "param1")?,
            param2: field(message, "param2")?,
            param3: field(message, "param3")?,
            flag: field(message, "flag")?,
        })
    }
}

/// Read back waypoint `wp_no`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetWaypoint {
    /// Waypoint number.
    pub wp_no: u8,
}

impl Query for GetWaypoint {
    type Reply = Waypoint;

    fn params(&self) -> Fields {
        Fields::new().with("wp_no", self.wp_no)
    }
}

// ============================================================================
// GPS
// ============================================================================

/// How often the device broadcasts RAW_GPS; zero stops the broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpsReportInterval {
    /// Interval in milliseconds.
    pub interval_ms: u32,
}

impl Settings for GpsReportInterval {
    const KIND: MessageKind = MessageKind::GPS_REPORT_INTERVAL;

    fn to_fields(&self) -> Fields {
        Fields::new().with("gps_report_interval", self.interval_ms)
    }
}

/// GPS fix report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawGps {
    /// Whether the receiver has a fix.
    pub has_fix: bool,
    /// Satellites in view.
    pub num_satellites: u8,
    /// Latitude in degrees * 1e7.
    pub lat: i32,
    /// Longitude in degrees * 1e7.
    pub lon: i32,
    /// Altitude in metres.
    pub altitude: u16,
    /// Ground speed in cm/s.
    pub speed: u16,
    /// Ground course in tenths of a degree.
    pub ground_course: u16,
}

impl Reply for RawGps {
    const KIND: MessageKind = MessageKind::RAW_GPS;

    fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        check_kind(message, Self::KIND)?;
        Ok(RawGps {
            has_fix: field::<u8>(message, "has_fix")? != 0,
            num_satellites: field(message, "num_satellites")?,
            lat: field(message, "lat")?,
            lon: field(message, "lon")?,
            altitude: field(message, "altitude")?,
            speed: field(message, "speed")?,
            ground_course: field(message, "ground_course")?,
        })
    }
}

/// Poll RAW_GPS once instead of waiting for a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetRawGps;

impl Query for GetRawGps {
    type Reply = RawGps;
}

// ============================================================================
// Board status
// ============================================================================

/// Board identification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ident {
    /// Firmware version.
    pub version: u8,
    /// Airframe type.
    pub multitype: u8,
    /// MSP protocol version.
    pub msp_version: u8,
    /// Capability bit set.
    pub capability: u32,
}

impl Reply for Ident {
    const KIND: MessageKind = MessageKind::IDENT;

    fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        check_kind(message, Self::KIND)?;
        Ok(Ident {
            version: field(message, "version")?,
            multitype: field(message, "multitype")?,
            msp_version: field(message, "msp_version")?,
            capability: field(message, "capability")?,
        })
    }
}

/// Identify the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetIdent;

impl Query for GetIdent {
    type Reply = Ident;
}

/// Navigation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavStatus {
    /// GPS mode (none, hold, RTH, nav).
    pub gps_mode: u8,
    /// Navigation state machine state.
    pub nav_state: u8,
    /// Action of the mission step in progress.
    pub curr_mission_action: u8,
    /// Number of the mission step in progress.
    pub curr_mission_number: u8,
    /// Navigation error code.
    pub nav_error: u8,
    /// Bearing to the target in degrees.
    pub target_bearing: i16,
}

impl Reply for NavStatus {
    const KIND: MessageKind = MessageKind::NAV_STATUS;

    fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        check_kind(message, Self::KIND)?;
        Ok(NavStatus {
            gps_mode: field(message, "gps_mode")?,
            nav_state: field(message, "nav_state")?,
            curr_mission_action: field(message, "curr_mission_action")?,
            curr_mission_number: field(message, "curr_mission_number")?,
            nav_error: field(message, "nav_error")?,
            target_bearing: field(message, "target_bearing")?,
        })
    }
}

/// Read the navigation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetNavStatus;

impl Query for GetNavStatus {
    type Reply = NavStatus;
}
