use crate::ping::PingConfig;
use crate::portscan::PortScanConfig;
use crate::traceroute::TraceConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// All tunables of the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ping: PingConfig,
    pub port_scan: PortScanConfig,
    pub traceroute: TraceConfig,
    pub storage: StorageConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("vantage.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Probes allowed to run at the same time
    pub max_concurrent_probes: usize,
    /// Rows returned by a history query when no limit is given
    pub history_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 16,
            history_limit: 50,
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values no probe can run with.
    pub fn validate(&self) -> Result<()> {
        if self.ping.count == 0 || self.ping.count > 100 {
            anyhow::bail!("ping.count must be between 1 and 100");
        }
        if self.ping.per_packet_timeout.is_zero() {
            anyhow::bail!("ping.per_packet_timeout must be positive");
        }
        if self.port_scan.connect_timeout.is_zero() {
            anyhow::bail!("port_scan.connect_timeout must be positive");
        }
        if self.traceroute.overall_timeout.is_zero() {
            anyhow::bail!("traceroute.overall_timeout must be positive");
        }
        if self.traceroute.max_hops == 0 {
            anyhow::bail!("traceroute.max_hops must be at least 1");
        }
        if self.service.max_concurrent_probes == 0 {
            anyhow::bail!("service.max_concurrent_probes must be at least 1");
        }
        Ok(())
    }

    /// The default settings rendered as TOML.
    pub fn sample() -> String {
        toml::to_string_pretty(&Settings::default()).unwrap_or_default()
    }
}

/// (De)serializes a `Duration` as fractional seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
