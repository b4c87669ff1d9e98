use std::path::PathBuf;
use clap::Parser;
use log::LevelFilter;

/// Shows how close something is to an ultrasonic sensor that streams its readings over a
/// websocket.
///
/// While running, type a new ws:// or wss:// URL and press enter to switch to another sensor.
#[derive(Debug, Parser)]
#[command(name = "distance-buddy", version)]
pub struct Args {
    /// Websocket URL of the sensor, e.g. ws://192.168.1.70/ws
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Distance (centimeters) below which something counts as nearby
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Store --endpoint and --threshold in the config file
    #[arg(long)]
    pub save: bool,

    /// Path of the config file to use instead of the default one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose { LevelFilter::Debug } else { LevelFilter::Info }
    }
}
