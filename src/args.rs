// Commandline argument parser using clap for the Benjamin remote

use clap::{Args, Parser};
use std::{path::PathBuf, time::Duration};

use crate::config::{ConfigError, RemoteConfig};

// Options shared by every binary that talks to the robot. No doc comment
// here, clap would take it as the `about` of the flattening parser.
#[allow(missing_docs)]
#[derive(Debug, Args, Clone)]
pub struct LinkArgs {
    /// RON configuration file; built-in defaults are used when absent
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Hardware address of the robot, overriding the configuration
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// How long to scan for the robot, in milliseconds
    #[arg(short = 't', long = "scan-timeout")]
    pub scan_timeout_ms: Option<u64>,

    /// Talk to a simulated robot instead of the bluetooth adapter
    #[arg(long)]
    pub simulate: bool,

    /// Print the effective configuration as RON and exit
    #[arg(long)]
    pub dump_config: bool,

    /// List every advertising device for the scan timeout and exit
    #[arg(long)]
    pub scan: bool,
}

impl LinkArgs {
    /// Loads the configuration file (if any) and applies the overrides given
    /// on the command line.
    pub fn load_config(&self) -> Result<RemoteConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RemoteConfig::from_path(path)?,
            None => RemoteConfig::default(),
        };
        if let Some(address) = &self.address {
            config.link.target_address = address.clone();
        }
        if let Some(timeout) = self.scan_timeout_ms {
            config.link.scan_timeout_ms = timeout;
        }
        Ok(config)
    }
}

/// Drive the robot from the terminal and watch its radar.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct RemoteArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub link: LinkArgs,
}

/// Connect to the robot and log its radar notifications.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct MonitorArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub link: LinkArgs,

    /// Stop after this many seconds; runs until the link drops otherwise
    #[arg(short = 'd', long = "duration", value_parser = parse_seconds)]
    pub duration: Option<Duration>,
}

/// A positive, finite number of seconds.
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if secs <= 0.0 {
        return Err(format!("{} is not a positive number of seconds", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}", e))
}
