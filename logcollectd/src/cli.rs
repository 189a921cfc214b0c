//! CLI argument definitions for logcollectd.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! `-h` prints usage and exits successfully; unknown flags print usage
//! and exit with a failure status.

use std::path::PathBuf;

use clap::Parser;

use logcollect_core::config::LogcollectConfig;

/// UDP syslog collector.
///
/// Receives datagrams, stores them in hourly SQLite files
/// (`<dir>/YYYYMMDDHH.sqlite3`) and compresses files older than the
/// retention period.
#[derive(Parser, Debug, Default)]
#[command(name = "logcollectd")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Storage directory for hourly buckets (must already exist).
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<String>,

    /// UDP listen port (default: 514 when running as root, else 5140).
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Verbose diagnostics (debug log level).
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Path to logcollect.toml configuration file.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the collector.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment settings.
    ///
    /// `-v` raises the configured level to `debug`; `RUST_LOG` still wins
    /// at subscriber initialization.
    pub fn apply_overrides(&self, config: &mut LogcollectConfig) {
        if let Some(dir) = &self.dir {
            config.storage.dir.clone_from(dir);
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if self.verbose {
            config.general.log_level = "debug".to_owned();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
