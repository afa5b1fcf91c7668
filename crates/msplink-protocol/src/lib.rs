//! MSP Serial Protocol
//!
//! This crate provides the message codec and request/response session for
//! talking to a flight controller over a serial link using the MultiWii
//! Serial Protocol (MSP). Every frame is short, fixed-size per message kind,
//! and protected by an XOR checksum.
//!
//! # Protocol Overview
//!
//! Exchanges come in three shapes:
//!
//! - **Provide** (host → device): push settings, device answers with an ack
//! - **Request** (host → device): query, device answers with a response
//! - **Broadcast** (device → host): unsolicited periodic frame, e.g. RAW_GPS
//!
//! The [`SchemaRegistry`] knows the exact layout of every reply in advance,
//! so the [`Session`] always reads a predetermined number of bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use msplink_protocol::{GetWaypoint, Session, StreamTransport, Waypoint};
//!
//! let mut session = Session::new(StreamTransport::new(stream));
//!
//! session.provide_record(&Waypoint { wp_no: 1, action: 1, ..Default::default() })?;
//! let wp = session.query(&GetWaypoint { wp_no: 1 })?;
//! ```

mod constants;
mod error;
mod frame;
mod messages;
mod schema;
mod session;
mod transport;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use messages::*;
pub use schema::*;
pub use session::*;
pub use transport::*;
pub use types::*;
