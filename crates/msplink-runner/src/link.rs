//! Connection to the device through a UART-over-TCP bridge.
//!
//! The bridge forwards raw serial bytes in both directions, so the TCP
//! stream carries MSP frames unchanged.

use std::net::TcpStream;

use msplink_protocol::{Session, StreamTransport};
use tracing::{debug, info};

use crate::config::RunnerConfig;
use crate::error::RunnerError;

/// Session over a bridged TCP connection.
pub type TcpSession = Session<'static, StreamTransport<TcpStream>>;

/// Connect to the bridge named in `config` and wrap it in a session.
///
/// Waits out the configured wake delay before returning, since some boards
/// reboot when their serial port is opened.
pub fn connect(config: &RunnerConfig) -> Result<TcpSession, RunnerError> {
    info!("connecting to {}", config.connect);
    let stream = TcpStream::connect(&config.connect)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(config.poll_interval()))?;

    let wake_delay = config.wake_delay();
    if !wake_delay.is_zero() {
        info!("waiting {:?} for the board to start", wake_delay);
        std::thread::sleep(wake_delay);
    }

    debug!("connected, reply timeout {} ms", config.reply_timeout_ms);
    Ok(Session::new(StreamTransport::new(stream)).with_config(config.session_config()))
}
