//! Tests for the device operations behind the CLI subcommands.
//!
//! The scripted device answers in bursts: a read that cannot be satisfied
//! from the current burst times out, as a quiet serial line would, and the
//! next read starts on the following burst.

use std::collections::VecDeque;
use std::time::Duration;

use msplink_protocol::{
    encode_frame, encode_payload, Direction, MessageKind, Role, SchemaRegistry, Session,
    Settings, Transport, TransportError, Waypoint,
};
use msplink_runner::commands;
use msplink_runner::waypoints::parse_waypoints;
use msplink_runner::RunnerError;

#[derive(Default)]
struct BurstDevice {
    bursts: VecDeque<VecDeque<u8>>,
    writes: Vec<Vec<u8>>,
}

impl BurstDevice {
    fn new(bursts: Vec<Vec<u8>>) -> Self {
        BurstDevice {
            bursts: bursts.into_iter().map(VecDeque::from).collect(),
            writes: Vec::new(),
        }
    }

    /// Message ids of the frames the host wrote.
    fn written_ids(&self) -> Vec<u8> {
        self.writes.iter().map(|frame| frame[4]).collect()
    }
}

impl Transport for BurstDevice {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read_exact(&mut self, len: usize, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self.bursts.front_mut() {
            Some(burst) if burst.len() >= len => Ok(burst.drain(..len).collect()),
            Some(burst) => {
                let received = burst.len();
                self.bursts.pop_front();
                Err(TransportError::Timeout {
                    expected: len,
                    received,
                })
            }
            None => Err(TransportError::Timeout {
                expected: len,
                received: 0,
            }),
        }
    }
}

fn ack(kind: MessageKind) -> Vec<u8> {
    encode_frame(Direction::FromDevice, kind, &[])
}

fn raw_gps(sats: u8) -> Vec<u8> {
    let mut payload = vec![1, sats];
    payload.extend_from_slice(&(-338_688_000i32).to_le_bytes());
    payload.extend_from_slice(&1_512_093_000i32.to_le_bytes());
    payload.extend_from_slice(&[50, 0, 10, 0, 0x84, 0x03]);
    encode_frame(Direction::FromDevice, MessageKind::RAW_GPS, &payload)
}

fn waypoint_reply(waypoint: &Waypoint) -> Vec<u8> {
    let schema = SchemaRegistry::standard()
        .schema(MessageKind::SET_WP, Role::Provide)
        .unwrap();
    let payload = encode_payload(&schema, &waypoint.to_fields()).unwrap();
    encode_frame(Direction::FromDevice, MessageKind::GET_WP, &payload)
}

fn concat(frames: &[Vec<u8>]) -> Vec<u8> {
    frames.concat()
}

// ============================================================================
// Waypoints
// ============================================================================

#[test]
fn test_upload_mission_with_verify() {
    let mission = parse_waypoints("1 2 1 100 0 0 0\n3 4 RTH 0 0 0 0\n").unwrap();
    let mut script = Vec::new();
    for waypoint in &mission {
        script.push(ack(MessageKind::SET_WP));
        script.push(waypoint_reply(waypoint));
    }
    let mut session = Session::new(BurstDevice::new(vec![concat(&script)]));

    let count = commands::upload_mission(&mut session, &mission, true).unwrap();
    assert_eq!(count, 2);

    let device = session.into_transport();
    assert_eq!(device.written_ids(), vec![209, 118, 209, 118]);
    // GET_WP asks for the waypoint just written
    assert_eq!(device.writes[3][5], 2);
}

#[test]
fn test_upload_without_verify_only_writes() {
    let mission = parse_waypoints("1 2 1 100 0 0 0\n3 4 1 0 0 0 0\n5 6 LAND 0 0 0 0\n").unwrap();
    let acks = concat(&[
        ack(MessageKind::SET_WP),
        ack(MessageKind::SET_WP),
        ack(MessageKind::SET_WP),
    ]);
    let mut session = Session::new(BurstDevice::new(vec![acks]));

    commands::upload_mission(&mut session, &mission, false).unwrap();
    let device = session.into_transport();
    assert_eq!(device.written_ids(), vec![209, 209, 209]);
    // Last waypoint carries the end-of-mission flag
    assert_eq!(device.writes[2][25], 0xA5);
}

#[test]
fn test_verify_mismatch() {
    let waypoint = Waypoint {
        wp_no: 1,
        action: 1,
        lat: 10,
        lon: 20,
        ..Default::default()
    };
    let stored = Waypoint { altitude: 99, ..waypoint };
    let script = concat(&[ack(MessageKind::SET_WP), waypoint_reply(&stored)]);
    let mut session = Session::new(BurstDevice::new(vec![script]));

    let err = commands::set_waypoint(&mut session, &waypoint, true).unwrap_err();
    assert!(matches!(err, RunnerError::VerifyMismatch { wp_no: 1 }));
}

#[test]
fn test_upload_stops_at_rejection() {
    let mission = parse_waypoints("1 2 1 100 0 0 0\n3 4 1 0 0 0 0\n").unwrap();
    let script = concat(&[
        ack(MessageKind::SET_WP),
        encode_frame(Direction::Error, MessageKind::SET_WP, &[]),
    ]);
    let mut session = Session::new(BurstDevice::new(vec![script]));

    let err = commands::upload_mission(&mut session, &mission, false).unwrap_err();
    assert!(matches!(err, RunnerError::Protocol(_)));
    assert_eq!(err.to_string(), "device rejected SET_WP (209)");
}

// ============================================================================
// GPS
// ============================================================================

#[test]
fn test_stop_gps_quiet_link() {
    let mut session = Session::new(BurstDevice::new(vec![ack(MessageKind::GPS_REPORT_INTERVAL)]));

    assert_eq!(commands::stop_gps(&mut session).unwrap(), 0);
    let device = session.into_transport();
    assert_eq!(device.writes.len(), 1);
    assert_eq!(&device.writes[0][5..9], &[0, 0, 0, 0]);
}

#[test]
fn test_stop_gps_flushes_broadcast_ahead_of_ack() {
    // Two broadcasts were already on the wire when the stop request went out
    let mut session = Session::new(BurstDevice::new(vec![
        concat(&[raw_gps(7), raw_gps(8)]),
        ack(MessageKind::GPS_REPORT_INTERVAL),
    ]));

    let discarded = commands::stop_gps(&mut session).unwrap();
    // The first broadcast was read whole in place of the ack; the second was flushed
    assert_eq!(discarded, raw_gps(8).len());

    let device = session.into_transport();
    assert_eq!(device.written_ids(), vec![50, 50]);
}

#[test]
fn test_stop_gps_rejection_not_retried() {
    let mut session = Session::new(BurstDevice::new(vec![encode_frame(
        Direction::Error,
        MessageKind::GPS_REPORT_INTERVAL,
        &[],
    )]));

    assert!(commands::stop_gps(&mut session).is_err());
    assert_eq!(session.into_transport().writes.len(), 1);
}

#[test]
fn test_stream_gps() {
    let script = concat(&[
        ack(MessageKind::GPS_REPORT_INTERVAL),
        raw_gps(5),
        raw_gps(6),
        ack(MessageKind::GPS_REPORT_INTERVAL),
    ]);
    let mut session = Session::new(BurstDevice::new(vec![script]));

    let mut fixes = Vec::new();
    let received = commands::stream_gps(&mut session, 200, 2, |fix| fixes.push(*fix)).unwrap();

    assert_eq!(received, 2);
    assert_eq!(fixes.len(), 2);
    assert_eq!(fixes[0].num_satellites, 5);
    assert_eq!(fixes[1].num_satellites, 6);
    assert_eq!(fixes[1].lat, -338_688_000);
    assert_eq!(fixes[1].ground_course, 900);

    let device = session.into_transport();
    assert_eq!(device.writes.len(), 2);
    assert_eq!(&device.writes[0][5..9], &200u32.to_le_bytes());
    assert_eq!(&device.writes[1][5..9], &[0, 0, 0, 0]);
}

#[test]
fn test_stream_gps_stops_after_timeout() {
    let script = concat(&[ack(MessageKind::GPS_REPORT_INTERVAL), raw_gps(5)]);
    let mut session = Session::new(BurstDevice::new(vec![
        script,
        ack(MessageKind::GPS_REPORT_INTERVAL),
    ]));

    let err = commands::stream_gps(&mut session, 1000, 3, |_| {}).unwrap_err();
    assert!(matches!(err, RunnerError::Protocol(_)));
    // The stop request still went out
    assert_eq!(session.into_transport().written_ids(), vec![50, 50]);
}
