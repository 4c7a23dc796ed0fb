/// # vantage: validated network diagnostics with a per-user result history.
///
/// The library runs three probes against a single target host and records
/// every attempt for the user who asked:
///
/// - **Ping**: ICMP reachability through the operating system's `ping`
///   tool, with round-trip statistics and packet loss parsed from its output
/// - **Port scan**: a single TCP connect with a bounded timeout and a
///   well-known service name for the port
/// - **Traceroute**: the raw output of the system `traceroute`/`tracert`
///   tool, bounded by an overall deadline
///
/// Hosts are validated before anything reaches a process or a socket, and
/// external tools are always invoked with an argument vector, never a shell.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vantage::{Orchestrator, Platform, ProbeContext, ProbeRequest, Settings};
/// use vantage::{SqliteStore, StaticSession, UserId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::open_in_memory()?;
///     store.ensure_user(UserId(1), Some("ops@example.com"))?;
///
///     let ctx = ProbeContext::from_settings(
///         &Settings::default(),
///         Platform::detect(),
///         Arc::new(store),
///         Arc::new(StaticSession::user(UserId(1))),
///     );
///     let orchestrator = Orchestrator::new(ctx);
///
///     let req = ProbeRequest::new("example.com").with_port(443);
///     let response = orchestrator.port_scan(&req).await;
///     println!("{} {}", response.status, response.to_json());
///
///     Ok(())
/// }
/// ```
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod output;
pub mod parser;
pub mod ping;
pub mod platform;
pub mod portscan;
pub mod process;
pub mod services;
pub mod session;
pub mod store;
pub mod target;
pub mod traceroute;

pub use api::{ApiResponse, ProbeRequest, ResponseBody};
/// Command line interface for vantage
pub use cli::Cli;
pub use config::Settings;
pub use error::VantageError;
pub use orchestrator::{Orchestrator, ProbeContext};
pub use outcome::{
    Outcome, PingOutcome, PortScanOutcome, ProbeKind, ProbeReport, RecordId, StoredOutcome,
    TracerouteOutcome, UserId,
};
pub use ping::{PingConfig, Pinger};
pub use platform::Platform;
pub use portscan::{PortScanConfig, PortScanner};
pub use session::{SessionProvider, StaticSession};
pub use store::{ResultRecorder, SqliteStore};
pub use target::ProbeTarget;
pub use traceroute::{TraceConfig, Tracer};
