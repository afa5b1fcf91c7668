//! Device operations behind the `msplink` subcommands.
//!
//! Each takes a session over any [`Transport`] so they run the same against
//! a bridged socket or an in-memory device.

use msplink_protocol::{
    GetWaypoint, GpsReportInterval, RawGps, Session, Transport, Waypoint,
};
use tracing::{debug, info, warn};

use crate::error::RunnerError;

/// Write one waypoint, optionally reading it back to confirm.
pub fn set_waypoint<T: Transport>(
    session: &mut Session<'_, T>,
    waypoint: &Waypoint,
    verify: bool,
) -> Result<(), RunnerError> {
    debug!(wp_no = waypoint.wp_no, action = waypoint.action, "setting waypoint");
    session.provide_record(waypoint)?;

    if verify {
        let read_back = session.query(&GetWaypoint {
            wp_no: waypoint.wp_no,
        })?;
        if read_back != *waypoint {
            warn!(wp_no = waypoint.wp_no, ?read_back, "waypoint read back differs");
            return Err(RunnerError::VerifyMismatch {
                wp_no: waypoint.wp_no,
            });
        }
    }
    Ok(())
}

/// Write a mission in order. Stops at the first failure.
pub fn upload_mission<T: Transport>(
    session: &mut Session<'_, T>,
    waypoints: &[Waypoint],
    verify: bool,
) -> Result<usize, RunnerError> {
    for waypoint in waypoints {
        set_waypoint(session, waypoint, verify)?;
    }
    info!(count = waypoints.len(), verify, "mission uploaded");
    Ok(waypoints.len())
}

/// Set how often RAW_GPS is broadcast.
pub fn set_gps_interval<T: Transport>(
    session: &mut Session<'_, T>,
    interval_ms: u32,
) -> Result<(), RunnerError> {
    session.provide_record(&GpsReportInterval { interval_ms })?;
    Ok(())
}

/// Stop RAW_GPS broadcasts and drop any already in flight.
///
/// Broadcasts queued before the device saw the request can arrive ahead of
/// the ack; those are flushed first and the stop is sent once more.
/// Returns the number of stale bytes discarded.
pub fn stop_gps<T: Transport>(session: &mut Session<'_, T>) -> Result<usize, RunnerError> {
    let mut discarded = 0;
    match session.provide_record(&GpsReportInterval { interval_ms: 0 }) {
        Ok(()) => {}
        Err(e) if e.is_frame_corruption() => {
            debug!("stop request crossed a broadcast: {}", e);
            discarded += session.discard_input()?;
            set_gps_interval(session, 0)?;
        }
        Err(e) => return Err(e.into()),
    }
    discarded += session.discard_input()?;
    if discarded > 0 {
        info!(discarded, "flushed stale GPS broadcasts");
    }
    Ok(discarded)
}

/// Start broadcasts at `interval_ms` and hand `count` fixes to `on_fix`.
///
/// Broadcasts are stopped again before returning, even after an error.
pub fn stream_gps<T, F>(
    session: &mut Session<'_, T>,
    interval_ms: u32,
    count: usize,
    mut on_fix: F,
) -> Result<usize, RunnerError>
where
    T: Transport,
    F: FnMut(&RawGps),
{
    set_gps_interval(session, interval_ms)?;

    let mut received = 0;
    let result = loop {
        if received == count {
            break Ok(());
        }
        match session.receive_record::<RawGps>() {
            Ok(fix) => {
                on_fix(&fix);
                received += 1;
            }
            Err(e) => break Err(e),
        }
    };

    let stopped = stop_gps(session);
    result?;
    stopped?;
    Ok(received)
}
