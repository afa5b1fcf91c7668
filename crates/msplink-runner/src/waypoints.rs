//! Waypoint mission files.
//!
//! One waypoint per line, space separated:
//!
//! ```text
//! lat lon action altitude param1 param2 param3 [flag]
//! ```
//!
//! `lat`/`lon` are either integer degrees * 1e7 or decimal degrees.
//! `action` and `flag` accept a number or a mission name such as
//! `MISSION_WAYPOINT` / `MISSION_FLAG_END` (the prefix is optional). A blank
//! line ends the mission. Waypoints are numbered from 1 in file order, and
//! the last one is marked as the end of the mission unless it has a flag.

use std::path::Path;

use msplink_protocol::Waypoint;

use crate::error::RunnerError;

/// Most waypoints a mission may hold.
pub const MAX_WAYPOINTS: usize = 255;

/// Mission action codes.
pub const MISSION_ACTIONS: &[(&str, u8)] = &[
    ("WAYPOINT", 1),
    ("HOLD_UNLIM", 2),
    ("HOLD_TIME", 3),
    ("RTH", 4),
    ("SET_POI", 5),
    ("JUMP", 6),
    ("SET_HEADING", 7),
    ("LAND", 8),
];

/// Mission flags a host may set.
pub const MISSION_FLAGS: &[(&str, u8)] = &[
    ("END", MISSION_FLAG_END),
    ("HOME", 0x01),
    ("HOLD", 0x02),
    ("DO_LAND", 0x20),
];

/// Marks the last step of a mission.
pub const MISSION_FLAG_END: u8 = 0xA5;

/// Read and parse a waypoint file.
pub fn read_waypoints(path: impl AsRef<Path>) -> Result<Vec<Waypoint>, RunnerError> {
    let text = std::fs::read_to_string(path)?;
    parse_waypoints(&text)
}

/// Parse waypoint file contents.
pub fn parse_waypoints(text: &str) -> Result<Vec<Waypoint>, RunnerError> {
    let mut waypoints = Vec::new();
    let mut last_flagged = false;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if waypoints.len() == MAX_WAYPOINTS {
            return Err(RunnerError::parse(
                line_no,
                format!("mission holds at most {} waypoints", MAX_WAYPOINTS),
            ));
        }

        let columns: Vec<&str> = line.split_whitespace().collect();
        if !(7..=8).contains(&columns.len()) {
            return Err(RunnerError::parse(
                line_no,
                format!("expected 7 or 8 columns, found {}", columns.len()),
            ));
        }

        let flag = match columns.get(7) {
            Some(text) => Some(parse_named(text, "MISSION_FLAG_", MISSION_FLAGS).ok_or_else(
                || RunnerError::parse(line_no, format!("unknown flag '{}'", text)),
            )?),
            None => None,
        };
        last_flagged = flag.is_some();

        waypoints.push(Waypoint {
            wp_no: (waypoints.len() + 1) as u8,
            action: parse_named(columns[2], "MISSION_", MISSION_ACTIONS).ok_or_else(|| {
                RunnerError::parse(line_no, format!("unknown action '{}'", columns[2]))
            })?,
            lat: parse_coordinate(columns[0], 90.0).ok_or_else(|| {
                RunnerError::parse(line_no, format!("invalid latitude '{}'", columns[0]))
            })?,
            lon: parse_coordinate(columns[1], 180.0).ok_or_else(|| {
                RunnerError::parse(line_no, format!("invalid longitude '{}'", columns[1]))
            })?,
            altitude: parse_number(line_no, "altitude", columns[3])?,
            param1: parse_number(line_no, "param1", columns[4])?,
            param2: parse_number(line_no, "param2", columns[5])?,
            param3: parse_number(line_no, "param3", columns[6])?,
            flag: flag.unwrap_or(0),
        });
    }

    if let Some(last) = waypoints.last_mut() {
        if !last_flagged {
            last.flag = MISSION_FLAG_END;
        }
    }
    Ok(waypoints)
}

/// Look up an action or flag by number or name.
pub fn parse_named(text: &str, prefix: &str, table: &[(&str, u8)]) -> Option<u8> {
    if let Some(value) = parse_unsigned(text).and_then(|v| u8::try_from(v).ok()) {
        return Some(value);
    }
    let upper = text.to_ascii_uppercase();
    let name = upper.strip_prefix(prefix).unwrap_or(&upper);
    table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, value)| *value)
}

fn parse_number<T: TryFrom<u64>>(line_no: usize, column: &str, text: &str) -> Result<T, RunnerError> {
    parse_unsigned(text)
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| RunnerError::parse(line_no, format!("invalid {} '{}'", column, text)))
}

fn parse_unsigned(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Degrees * 1e7, from either a scaled integer or decimal degrees.
fn parse_coordinate(text: &str, limit: f64) -> Option<i32> {
    let scaled = if text.contains('.') {
        let degrees: f64 = text.parse().ok()?;
        if !degrees.is_finite() {
            return None;
        }
        (degrees * 1e7).round() as i64
    } else {
        text.parse().ok()?
    };
    if scaled.abs() > (limit * 1e7) as i64 {
        return None;
    }
    i32::try_from(scaled).ok()
}
