use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::{Cadence, DivisorMode, DEFAULT_PS_COMMAND};

/// App Watcher - tracks applications, helpers and daemons in the process table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 9999)]
    pub port: u16,

    /// Listen address
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "0.0.0.0")]
    pub address: String,

    /// Seconds between state refreshes
    #[arg(long, env = "STATE_INTERVAL", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub state_interval: u64,

    /// Seconds between full stats pushes
    #[arg(long, env = "STATS_INTERVAL", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub stats_interval: u64,

    /// Divide CPU readings by one or by the physical core count
    #[arg(long, env = "CPU_DIVISOR", value_enum, default_value_t = DivisorMode::One)]
    pub cpu_divisor: DivisorMode,

    /// Command producing the process table
    #[arg(long, env = "PS_COMMAND", default_value = DEFAULT_PS_COMMAND)]
    pub ps_command: String,

    /// JSON file with targets to register at startup
    #[arg(short, long, env = "TARGETS")]
    pub targets: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "DEBUG")]
    pub debug: bool,
}

impl CommandArgs {
    pub fn cadence(&self) -> Cadence {
        Cadence {
            state: Duration::from_secs(self.state_interval),
            stats: Duration::from_secs(self.stats_interval),
        }
    }
}
