use crate::error::VantageError;
use crate::outcome::{PortScanOutcome, ProbeReport, UserId};
use crate::services::service_name;
use crate::target::ProbeTarget;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpStream, lookup_host};

/// Configuration for the port scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortScanConfig {
    #[serde(with = "crate::config::duration_secs")]
    pub connect_timeout: Duration,
    #[serde(with = "crate::config::duration_secs")]
    pub resolve_timeout: Duration,
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            resolve_timeout: Duration::from_secs(5),
        }
    }
}

/// How a connect attempt ended.
#[derive(Debug)]
enum ConnectState {
    Open { peer: SocketAddr, latency: Duration },
    Refused,
    TimedOut,
    Failed(std::io::Error),
}

/// Probes one TCP port with a plain connect; no external process involved.
#[derive(Debug, Clone, Default)]
pub struct PortScanner {
    config: PortScanConfig,
}

impl PortScanner {
    pub fn new(config: PortScanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PortScanConfig {
        &self.config
    }

    /// Resolves the target to every socket address it has, in lookup order.
    ///
    /// Lookup failure, an empty answer or a lookup that outlives
    /// `resolve_timeout` all yield [`VantageError::Resolution`].
    pub async fn resolve(
        &self,
        target: &ProbeTarget,
        port: u16,
    ) -> Result<Vec<SocketAddr>, VantageError> {
        let domain = match target {
            ProbeTarget::Ip(ip) => return Ok(vec![SocketAddr::new(*ip, port)]),
            ProbeTarget::Domain(domain) => domain,
        };

        let resolution_error = |reason: String| VantageError::Resolution {
            host: domain.clone(),
            reason,
        };

        let addrs: Vec<SocketAddr> = tokio::time::timeout(
            self.config.resolve_timeout,
            lookup_host((domain.as_str(), port)),
        )
        .await
        .map_err(|_| resolution_error("lookup timed out".to_string()))?
        .map_err(|e| resolution_error(e.to_string()))?
        .collect();

        if addrs.is_empty() {
            return Err(resolution_error("no addresses found".to_string()));
        }
        Ok(addrs)
    }

    /// Tries each address in order until one accepts, all inside one
    /// `connect_timeout`. A failure reports the last address's error.
    async fn connect(&self, addrs: &[SocketAddr]) -> ConnectState {
        let start = Instant::now();
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addrs)).await {
            Ok(Ok(stream)) => ConnectState::Open {
                peer: stream.peer_addr().unwrap_or_else(|_| addrs[0]),
                latency: start.elapsed(),
            },
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ConnectState::Refused,
            Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => ConnectState::TimedOut,
            Ok(Err(e)) => ConnectState::Failed(e),
            Err(_) => ConnectState::TimedOut,
        }
    }

    /// Checks whether `port` on `target` accepts TCP connections.
    ///
    /// Refused, timed out and otherwise failed connects all come back as
    /// `is_open = false`; only the raw text tells them apart. A host that
    /// does not resolve is an error instead of an outcome.
    pub async fn scan(
        &self,
        target: &ProbeTarget,
        port: u16,
        user: UserId,
    ) -> Result<ProbeReport<PortScanOutcome>, VantageError> {
        if port == 0 {
            return Err(VantageError::Validation(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        let attempted_at = chrono::Utc::now();
        let addrs = self.resolve(target, port).await?;
        let tried = describe(&addrs);
        info!("Scanning {} ({}) port {}", target, tried, port);

        let state = self.connect(&addrs).await;
        debug!("Connect to {} ended with {:?}", tried, state);

        let timeout_ms = self.config.connect_timeout.as_millis();
        let (is_open, service, raw_output) = match state {
            ConnectState::Open { peer, latency } => {
                let service = service_name(port).map(str::to_string);
                let raw = format!(
                    "Connected to {} in {:.2} ms (service: {})",
                    peer,
                    latency.as_secs_f64() * 1000.0,
                    service.as_deref().unwrap_or("unknown")
                );
                (true, service, raw)
            }
            ConnectState::Refused => (false, None, format!("Connection to {} refused", tried)),
            ConnectState::TimedOut => (
                false,
                None,
                format!("No response from {} within {} ms", tried, timeout_ms),
            ),
            ConnectState::Failed(e) => {
                (false, None, format!("Connection to {} failed: {}", tried, e))
            }
        };

        info!(
            "Port {} on {} is {}",
            port,
            target,
            if is_open { "open" } else { "closed" }
        );

        Ok(ProbeReport::ok(PortScanOutcome {
            target: target.to_string(),
            port,
            attempted_at,
            is_open,
            service,
            raw_output,
            user_id: user,
        }))
    }
}

fn describe(addrs: &[SocketAddr]) -> String {
    addrs
        .iter()
        .map(SocketAddr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
