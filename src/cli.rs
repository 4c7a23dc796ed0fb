use crate::config::Settings;
use crate::outcome::ProbeKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "vantage",
    version,
    about = "Network diagnostics: ping, TCP port probes and traceroute with per-user history",
    long_about = "vantage validates a target host, runs one diagnostic probe against it and records \
                  the attempt, successful or not, in a per-user SQLite history.",
    next_line_help = true,
    after_help = "EXAMPLES:
    vantage --user 1 ping 1.1.1.1
    vantage --user 1 ping example.com --count 2 --timeout 1
    vantage --user 1 scan example.com 443
    vantage --user 1 trace example.com --max-hops 20
    vantage --user 1 history scan --limit 10
    vantage config > vantage.toml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        short,
        long,
        global = true,
        help = "Id of the authenticated user the probe runs for",
        help_heading = "SESSION"
    )]
    pub user: Option<i64>,

    #[arg(
        long,
        global = true,
        help = "Settings file (TOML)",
        help_heading = "CONFIGURATION"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "SQLite database holding the result history",
        help_heading = "CONFIGURATION"
    )]
    pub db: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Print the response as JSON",
        help_heading = "OUTPUT OPTIONS"
    )]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a host answers ICMP echo requests
    Ping {
        /// Target IP address or hostname
        host: String,

        /// Number of echo requests
        #[arg(long, short = 'n')]
        count: Option<u32>,

        /// Seconds to wait for each reply
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Check whether a TCP port accepts connections
    Scan {
        /// Target IP address or hostname
        host: String,

        /// Port number (1-65535)
        port: String,

        /// Connect timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Trace the route to a host
    Trace {
        /// Target IP address or hostname
        host: String,

        /// Overall timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Maximum number of hops to try
        #[arg(long = "max-hops", short = 'm')]
        max_hops: Option<u8>,
    },

    /// List recorded results, newest first
    History {
        /// Only show one kind of probe
        #[arg(value_enum)]
        kind: Option<HistoryKind>,

        /// Maximum number of entries
        #[arg(long, short = 'l')]
        limit: Option<usize>,
    },

    /// Print the default settings as TOML
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryKind {
    Ping,
    Scan,
    Trace,
}

impl From<HistoryKind> for ProbeKind {
    fn from(kind: HistoryKind) -> Self {
        match kind {
            HistoryKind::Ping => ProbeKind::Ping,
            HistoryKind::Scan => ProbeKind::PortScan,
            HistoryKind::Trace => ProbeKind::Traceroute,
        }
    }
}

impl Cli {
    /// Settings from the config file (or defaults) with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings, anyhow::Error> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(db) = &self.db {
            settings.storage.database = db.clone();
        }

        match &self.command {
            Command::Ping { count, timeout, .. } => {
                if let Some(count) = count {
                    settings.ping.count = *count;
                }
                if let Some(secs) = timeout {
                    settings.ping.per_packet_timeout = seconds(*secs)?;
                }
            }
            Command::Scan { timeout, .. } => {
                if let Some(secs) = timeout {
                    settings.port_scan.connect_timeout = seconds(*secs)?;
                }
            }
            Command::Trace {
                timeout, max_hops, ..
            } => {
                if let Some(secs) = timeout {
                    settings.traceroute.overall_timeout = seconds(*secs)?;
                }
                if let Some(hops) = max_hops {
                    settings.traceroute.max_hops = *hops;
                }
            }
            Command::History { .. } | Command::Config => {}
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn seconds(secs: f64) -> Result<Duration, anyhow::Error> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow::anyhow!("Invalid timeout: {} seconds", secs))
}
