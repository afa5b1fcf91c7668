//! Message schemas and the registry that maps message kinds to them.
//!
//! Every message kind has up to four registered layouts, one per role:
//!
//! - **Provide** (host → device): settings push, answered by an ack
//! - **Request** (host → device): query, answered by a response
//! - **Response** (device → host): reply to a request
//! - **Broadcast** (device → host): unsolicited periodic frame
//!
//! Acks are never registered by hand. Any kind with a provide schema is
//! acknowledged with a zero-payload frame carrying the same message id, and
//! any kind without a parameterised request is queried with a zero-payload
//! frame.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{Direction, MessageKind, Role};

/// One little-endian integer field of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    name: &'static str,
    width: u8,
    signed: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, width: u8, signed: bool) -> Self {
        FieldSpec {
            name,
            width,
            signed,
        }
    }

    /// Unsigned 8-bit field.
    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, 1, false)
    }

    /// Unsigned 16-bit field.
    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, 2, false)
    }

    /// Unsigned 32-bit field.
    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, 4, false)
    }

    /// Signed 8-bit field.
    pub const fn i8(name: &'static str) -> Self {
        Self::new(name, 1, true)
    }

    /// Signed 16-bit field.
    pub const fn i16(name: &'static str) -> Self {
        Self::new(name, 2, true)
    }

    /// Signed 32-bit field.
    pub const fn i32(name: &'static str) -> Self {
        Self::new(name, 4, true)
    }

    /// Field name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Width in bytes (1, 2 or 4).
    pub const fn width(&self) -> usize {
        self.width as usize
    }

    /// Whether the field is two's complement.
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Smallest value the field can carry.
    pub const fn min(&self) -> i64 {
        if self.signed {
            -(1i64 << (self.width as u32 * 8 - 1))
        } else {
            0
        }
    }

    /// Largest value the field can carry.
    pub const fn max(&self) -> i64 {
        if self.signed {
            (1i64 << (self.width as u32 * 8 - 1)) - 1
        } else {
            (1i64 << (self.width as u32 * 8)) - 1
        }
    }

    /// Whether `value` fits this field.
    pub const fn fits(&self, value: i64) -> bool {
        value >= self.min() && value <= self.max()
    }
}

/// Sum of the widths of `fields`.
pub const fn payload_len(fields: &[FieldSpec]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].width as usize;
        i += 1;
    }
    total
}

/// Wire layout of one message in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSchema {
    kind: MessageKind,
    direction: Direction,
    payload_size: u8,
    fields: &'static [FieldSpec],
}

impl MessageSchema {
    /// Zero-payload schema.
    pub const fn empty(kind: MessageKind, direction: Direction) -> Self {
        MessageSchema {
            kind,
            direction,
            payload_size: 0,
            fields: &[],
        }
    }

    /// The ack a device sends for a provide of `kind`.
    pub const fn ack(kind: MessageKind) -> Self {
        Self::empty(kind, Direction::FromDevice)
    }

    /// The implicit "fetch by id" request for `kind`.
    pub const fn default_request(kind: MessageKind) -> Self {
        Self::empty(kind, Direction::ToDevice)
    }

    /// Message kind (the id byte).
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Direction frames of this schema travel.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Declared payload size in bytes.
    pub fn payload_size(&self) -> u8 {
        self.payload_size
    }

    /// Payload fields in wire order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Total frame length: header, payload, and checksum.
    pub fn frame_len(&self) -> usize {
        MSP_FRAME_OVERHEAD + self.payload_size as usize
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }
}

// ============================================================================
// Built-in schema tables
// ============================================================================

/// Waypoint layout shared by SET_WP provide and GET_WP response.
pub const WAYPOINT_FIELDS: &[FieldSpec] = &[
    FieldSpec::u8("wp_no"),
    FieldSpec::u8("action"),
    FieldSpec::i32("lat"),
    FieldSpec::i32("lon"),
    FieldSpec::u32("altitude"),
    FieldSpec::u16("param1"),
    FieldSpec::u16("param2"),
    FieldSpec::u16("param3"),
    FieldSpec::u8("flag"),
];
/// Payload size of [`WAYPOINT_FIELDS`].
pub const WAYPOINT_PAYLOAD_SIZE: usize = 21;

/// GPS_REPORT_INTERVAL provide layout.
pub const GPS_REPORT_INTERVAL_FIELDS: &[FieldSpec] = &[FieldSpec::u32("gps_report_interval")];
/// Payload size of [`GPS_REPORT_INTERVAL_FIELDS`].
pub const GPS_REPORT_INTERVAL_PAYLOAD_SIZE: usize = 4;

/// GET_WP request parameters.
pub const GET_WP_REQUEST_FIELDS: &[FieldSpec] = &[FieldSpec::u8("wp_no")];
/// Payload size of [`GET_WP_REQUEST_FIELDS`].
pub const GET_WP_REQUEST_PAYLOAD_SIZE: usize = 1;

/// IDENT response layout.
pub const IDENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::u8("version"),
    FieldSpec::u8("multitype"),
    FieldSpec::u8("msp_version"),
    FieldSpec::u32("capability"),
];
/// Payload size of [`IDENT_FIELDS`].
pub const IDENT_PAYLOAD_SIZE: usize = 7;

/// NAV_STATUS response layout.
pub const NAV_STATUS_FIELDS: &[FieldSpec] = &[
    FieldSpec::u8("gps_mode"),
    FieldSpec::u8("nav_state"),
    FieldSpec::u8("curr_mission_action"),
    FieldSpec::u8("curr_mission_number"),
    FieldSpec::u8("nav_error"),
    FieldSpec::i16("target_bearing"),
];
/// Payload size of [`NAV_STATUS_FIELDS`].
pub const NAV_STATUS_PAYLOAD_SIZE: usize = 7;

/// RAW_GPS response and broadcast layout.
pub const RAW_GPS_FIELDS: &[FieldSpec] = &[
    FieldSpec::u8("has_fix"),
    FieldSpec::u8("num_satellites"),
    FieldSpec::i32("lat"),
    FieldSpec::i32("lon"),
    FieldSpec::u16("altitude"),
    FieldSpec::u16("speed"),
    FieldSpec::u16("ground_course"),
];
/// Payload size of [`RAW_GPS_FIELDS`].
pub const RAW_GPS_PAYLOAD_SIZE: usize = 16;

const _: () = assert!(payload_len(WAYPOINT_FIELDS) == WAYPOINT_PAYLOAD_SIZE);
const _: () = assert!(payload_len(GPS_REPORT_INTERVAL_FIELDS) == GPS_REPORT_INTERVAL_PAYLOAD_SIZE);
const _: () = assert!(payload_len(GET_WP_REQUEST_FIELDS) == GET_WP_REQUEST_PAYLOAD_SIZE);
const _: () = assert!(payload_len(IDENT_FIELDS) == IDENT_PAYLOAD_SIZE);
const _: () = assert!(payload_len(NAV_STATUS_FIELDS) == NAV_STATUS_PAYLOAD_SIZE);
const _: () = assert!(payload_len(RAW_GPS_FIELDS) == RAW_GPS_PAYLOAD_SIZE);

// ============================================================================
// Registry
// ============================================================================

/// Immutable mapping from `(kind, role)` to wire layout.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<(MessageKind, Role), MessageSchema>,
}

impl SchemaRegistry {
    /// Start a registry with no schemas.
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    /// The process-wide registry of built-in message kinds.
    pub fn standard() -> &'static SchemaRegistry {
        static STANDARD: OnceLock<SchemaRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            SchemaRegistryBuilder::standard()
                .build()
                .expect("built-in schema tables are checked at compile time")
        })
    }

    /// Resolve the schema for `kind` in `role`.
    ///
    /// Requests fall back to the zero-payload default. Acks exist for every
    /// kind that has a provide schema.
    pub fn schema(&self, kind: MessageKind, role: Role) -> Result<MessageSchema, ProtocolError> {
        if let Some(schema) = self.schemas.get(&(kind, role)) {
            return Ok(*schema);
        }
        match role {
            Role::Request => Ok(MessageSchema::default_request(kind)),
            Role::Ack if self.schemas.contains_key(&(kind, Role::Provide)) => {
                Ok(MessageSchema::ack(kind))
            }
            _ => Err(ProtocolError::UnknownMessageKind { kind, role }),
        }
    }

    /// Whether a schema was explicitly registered for `kind` in `role`.
    pub fn is_registered(&self, kind: MessageKind, role: Role) -> bool {
        self.schemas.contains_key(&(kind, role))
    }

    /// All kinds with at least one registered schema, in id order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<MessageKind> = self.schemas.keys().map(|(kind, _)| *kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Number of explicit registrations.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Registration {
    kind: MessageKind,
    role: Role,
    payload_size: usize,
    fields: &'static [FieldSpec],
}

/// Collects schema registrations and validates them on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistryBuilder {
    entries: Vec<Registration>,
}

impl SchemaRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        SchemaRegistryBuilder {
            entries: Vec::new(),
        }
    }

    /// A builder pre-loaded with the built-in message kinds.
    pub fn standard() -> Self {
        SchemaRegistryBuilder::new()
            .provide(MessageKind::SET_WP, WAYPOINT_PAYLOAD_SIZE, WAYPOINT_FIELDS)
            .provide(
                MessageKind::GPS_REPORT_INTERVAL,
                GPS_REPORT_INTERVAL_PAYLOAD_SIZE,
                GPS_REPORT_INTERVAL_FIELDS,
            )
            .request(MessageKind::GET_WP, GET_WP_REQUEST_PAYLOAD_SIZE, GET_WP_REQUEST_FIELDS)
            .response(MessageKind::IDENT, IDENT_PAYLOAD_SIZE, IDENT_FIELDS)
            .response(MessageKind::GET_WP, WAYPOINT_PAYLOAD_SIZE, WAYPOINT_FIELDS)
            .response(MessageKind::NAV_STATUS, NAV_STATUS_PAYLOAD_SIZE, NAV_STATUS_FIELDS)
            .response(MessageKind::RAW_GPS, RAW_GPS_PAYLOAD_SIZE, RAW_GPS_FIELDS)
            .broadcast(MessageKind::RAW_GPS, RAW_GPS_PAYLOAD_SIZE, RAW_GPS_FIELDS)
    }

    /// Register a layout for `kind` in `role`.
    pub fn register(
        mut self,
        kind: MessageKind,
        role: Role,
        payload_size: usize,
        fields: &'static [FieldSpec],
    ) -> Self {
        self.entries.push(Registration {
            kind,
            role,
            payload_size,
            fields,
        });
        self
    }

    /// Register a settings push.
    pub fn provide(self, kind: MessageKind, payload_size: usize, fields: &'static [FieldSpec]) -> Self {
        self.register(kind, Role::Provide, payload_size, fields)
    }

    /// Register a parameterised request.
    pub fn request(self, kind: MessageKind, payload_size: usize, fields: &'static [FieldSpec]) -> Self {
        self.register(kind, Role::Request, payload_size, fields)
    }

    /// Register a response to a request.
    pub fn response(self, kind: MessageKind, payload_size: usize, fields: &'static [FieldSpec]) -> Self {
        self.register(kind, Role::Response, payload_size, fields)
    }

    /// Register an unsolicited device frame.
    pub fn broadcast(self, kind: MessageKind, payload_size: usize, fields: &'static [FieldSpec]) -> Self {
        self.register(kind, Role::Broadcast, payload_size, fields)
    }

    /// Validate every registration and freeze the registry.
    pub fn build(self) -> Result<SchemaRegistry, ProtocolError> {
        let mut schemas = HashMap::with_capacity(self.entries.len());

        for entry in self.entries {
            let actual = payload_len(entry.fields);
            if entry.payload_size != actual || entry.payload_size > MSP_MAX_PAYLOAD_SIZE {
                return Err(ProtocolError::SchemaInconsistency {
                    kind: entry.kind,
                    role: entry.role,
                    declared: entry.payload_size,
                    actual,
                });
            }

            let schema = MessageSchema {
                kind: entry.kind,
                direction: entry.role.direction(),
                payload_size: entry.payload_size as u8,
                fields: entry.fields,
            };
            if schemas.insert((entry.kind, entry.role), schema).is_some() {
                return Err(ProtocolError::DuplicateSchema {
                    kind: entry.kind,
                    role: entry.role,
                });
            }
        }

        Ok(SchemaRegistry { schemas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ranges() {
        assert_eq!(FieldSpec::u8("a").max(), 255);
        assert_eq!(FieldSpec::i8("a").min(), -128);
        assert_eq!(FieldSpec::u16("a").max(), 65_535);
        assert_eq!(FieldSpec::i16("a").min(), -32_768);
        assert_eq!(FieldSpec::u32("a").max(), u32::MAX as i64);
        assert_eq!(FieldSpec::i32("a").min(), i32::MIN as i64);
        assert!(FieldSpec::i32("a").fits(-1));
        assert!(!FieldSpec::u32("a").fits(-1));
    }

    #[test]
    fn test_standard_registry_lookups() {
        let registry = SchemaRegistry::standard();

        let set_wp = registry.schema(MessageKind::SET_WP, Role::Provide).unwrap();
        assert_eq!(set_wp.payload_size(), 21);
        assert_eq!(set_wp.frame_len(), 27);
        assert_eq!(set_wp.direction(), Direction::ToDevice);

        let ack = registry.schema(MessageKind::SET_WP, Role::Ack).unwrap();
        assert_eq!(ack.payload_size(), 0);
        assert_eq!(ack.frame_len(), 6);
        assert_eq!(ack.direction(), Direction::FromDevice);

        let gps = registry.schema(MessageKind::RAW_GPS, Role::Broadcast).unwrap();
        assert_eq!(gps.frame_len(), 22);

        assert_eq!(
            registry.kinds(),
            vec![
                MessageKind::GPS_REPORT_INTERVAL,
                MessageKind::IDENT,
                MessageKind::RAW_GPS,
                MessageKind::GET_WP,
                MessageKind::NAV_STATUS,
                MessageKind::SET_WP,
            ]
        );
    }

    #[test]
    fn test_default_request_schema() {
        let registry = SchemaRegistry::standard();

        let ident = registry.schema(MessageKind::IDENT, Role::Request).unwrap();
        assert_eq!(ident, MessageSchema::default_request(MessageKind::IDENT));
        assert!(!registry.is_registered(MessageKind::IDENT, Role::Request));

        let get_wp = registry.schema(MessageKind::GET_WP, Role::Request).unwrap();
        assert_eq!(get_wp.payload_size(), 1);
        assert!(get_wp.field("wp_no").is_some());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = SchemaRegistry::standard();
        let err = registry.schema(MessageKind(7), Role::Response).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownMessageKind {
                kind: MessageKind(7),
                role: Role::Response
            }
        ));

        // IDENT is request-only, so it has nothing to acknowledge
        assert!(registry.schema(MessageKind::IDENT, Role::Ack).is_err());
    }

    #[test]
    fn test_inconsistent_registration() {
        const BATTERY: &[FieldSpec] = &[FieldSpec::u8("vbat"), FieldSpec::u16("power_meter")];

        let err = SchemaRegistry::builder()
            .response(MessageKind(110), 4, BATTERY)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::SchemaInconsistency {
                declared: 4,
                actual: 3,
                role: Role::Response,
                ..
            }
        ));

        let registry = SchemaRegistry::builder()
            .response(MessageKind(110), 3, BATTERY)
            .build()
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.schema(MessageKind(110), Role::Response).unwrap().frame_len(),
            9
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let err = SchemaRegistryBuilder::standard()
            .response(MessageKind::IDENT, IDENT_PAYLOAD_SIZE, IDENT_FIELDS)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::DuplicateSchema {
                kind: MessageKind::IDENT,
                role: Role::Response
            }
        ));
    }
}
