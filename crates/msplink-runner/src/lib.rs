//! msplink Runner Library
//!
//! Pieces behind the `msplink` binary: configuration, the TCP bridge
//! connection, waypoint mission files and the device operations each
//! subcommand performs.

pub mod commands;
pub mod config;
pub mod error;
pub mod link;
pub mod waypoints;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use link::{connect, TcpSession};
