//! `msplink`: talk to an MSP flight controller through a serial bridge.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use msplink_protocol::{GetIdent, GetNavStatus, GetWaypoint, Waypoint};
use msplink_runner::commands;
use msplink_runner::waypoints::{self, MISSION_ACTIONS, MISSION_FLAGS};
use msplink_runner::{connect, RunnerConfig, RunnerError, TcpSession};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "msplink", version, about = "MSP flight controller link")]
struct Cli {
    /// YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bridge address (`host:port`), overriding the config file.
    #[arg(long)]
    connect: Option<String>,

    /// Reply timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Seconds to wait after connecting before the first exchange.
    #[arg(long)]
    wake_delay_secs: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify the board.
    Ident,
    /// Show the navigation state.
    NavStatus,
    /// Read one waypoint.
    GetWp {
        /// Waypoint number (0 is home).
        wp_no: u8,
    },
    /// Write one waypoint.
    SetWp(SetWpArgs),
    /// Upload a waypoint mission file.
    Upload {
        file: PathBuf,
        /// Read every waypoint back after writing it.
        #[arg(long)]
        verify: bool,
    },
    /// Set the RAW_GPS broadcast interval (0 stops broadcasts).
    GpsInterval { interval_ms: u32 },
    /// Stop RAW_GPS broadcasts and flush stale input.
    StopGps,
    /// Print RAW_GPS broadcasts.
    GpsStream {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u32,
        /// Number of fixes to print before stopping.
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[derive(Args, Debug)]
struct SetWpArgs {
    #[arg(long)]
    wp_no: u8,
    /// Action number or name (e.g. MISSION_WAYPOINT).
    #[arg(long, value_parser = parse_action)]
    action: u8,
    /// Latitude in degrees * 1e7.
    #[arg(long, allow_hyphen_values = true)]
    lat: i32,
    /// Longitude in degrees * 1e7.
    #[arg(long, allow_hyphen_values = true)]
    lon: i32,
    /// Altitude in centimetres.
    #[arg(long)]
    altitude: u32,
    #[arg(long, default_value_t = 0)]
    param1: u16,
    #[arg(long, default_value_t = 0)]
    param2: u16,
    #[arg(long, default_value_t = 0)]
    param3: u16,
    /// Flag number or name (e.g. MISSION_FLAG_END).
    #[arg(long, value_parser = parse_flag, default_value = "0")]
    flag: u8,
    /// Read the waypoint back after writing it.
    #[arg(long)]
    verify: bool,
}

impl SetWpArgs {
    fn waypoint(&self) -> Waypoint {
        Waypoint {
            wp_no: self.wp_no,
            action: self.action,
            lat: self.lat,
            lon: self.lon,
            altitude: self.altitude,
            param1: self.param1,
            param2: self.param2,
            param3: self.param3,
            flag: self.flag,
        }
    }
}

fn parse_action(text: &str) -> Result<u8, String> {
    waypoints::parse_named(text, "MISSION_", MISSION_ACTIONS)
        .ok_or_else(|| format!("unknown mission action '{}'", text))
}

fn parse_flag(text: &str) -> Result<u8, String> {
    waypoints::parse_named(text, "MISSION_FLAG_", MISSION_FLAGS)
        .ok_or_else(|| format!("unknown mission flag '{}'", text))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<RunnerConfig, RunnerError> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(connect) = &cli.connect {
        config.connect = connect.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.reply_timeout_ms = timeout_ms;
    }
    if let Some(wake_delay_secs) = cli.wake_delay_secs {
        config.wake_delay_secs = wake_delay_secs;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), RunnerError> {
    let config = load_config(&cli)?;

    // Parse local input before touching the device
    let mission = match &cli.command {
        Command::Upload { file, .. } => Some(waypoints::read_waypoints(file)?),
        _ => None,
    };

    let mut session: TcpSession = connect(&config)?;

    match cli.command {
        Command::Ident => {
            let ident = session.query(&GetIdent)?;
            println!(
                "version {} multitype {} msp_version {} capability 0x{:08X}",
                ident.version, ident.multitype, ident.msp_version, ident.capability
            );
        }
        Command::NavStatus => {
            let status = session.query(&GetNavStatus)?;
            println!("{:#?}", status);
        }
        Command::GetWp { wp_no } => {
            let waypoint = session.query(&GetWaypoint { wp_no })?;
            println!("{:#?}", waypoint);
        }
        Command::SetWp(args) => {
            commands::set_waypoint(&mut session, &args.waypoint(), args.verify)?;
            info!("waypoint {} set", args.wp_no);
        }
        Command::Upload { verify, .. } => {
            let mission = mission.unwrap_or_default();
            let count = commands::upload_mission(&mut session, &mission, verify)?;
            println!("uploaded {} waypoints", count);
        }
        Command::GpsInterval { interval_ms } => {
            commands::set_gps_interval(&mut session, interval_ms)?;
            info!("GPS report interval set to {} ms", interval_ms);
        }
        Command::StopGps => {
            let discarded = commands::stop_gps(&mut session)?;
            println!("GPS broadcasts stopped ({} stale bytes discarded)", discarded);
        }
        Command::GpsStream { interval_ms, count } => {
            commands::stream_gps(&mut session, interval_ms, count, |fix| {
                println!(
                    "fix={} sats={} lat={} lon={} alt={}m speed={}cm/s course={}",
                    fix.has_fix,
                    fix.num_satellites,
                    fix.lat,
                    fix.lon,
                    fix.altitude,
                    fix.speed,
                    fix.ground_course
                );
            })?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
