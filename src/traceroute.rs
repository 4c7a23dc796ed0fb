use crate::error::VantageError;
use crate::outcome::{ProbeReport, TracerouteOutcome, UserId};
use crate::platform::{Platform, ToolCommand};
use crate::process::{ToolRun, run_with_deadline};
use crate::target::ProbeTarget;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for traceroute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Hard deadline for the whole trace
    #[serde(with = "crate::config::duration_secs")]
    pub overall_timeout: Duration,
    /// Maximum number of hops to try
    pub max_hops: u8,
    /// How long the tool waits for each hop's reply
    #[serde(with = "crate::config::duration_secs")]
    pub wait_per_hop: Duration,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(30),
            // Standard 30 hops max
            max_hops: 30,
            wait_per_hop: Duration::from_secs(2),
        }
    }
}

/// Traces the route to a host with the platform's traceroute/tracert.
///
/// The tool's own output is kept verbatim; hops are not parsed. A clean
/// exit marks the trace completed, an error exit keeps the tool's error
/// text with `completed = false`, and running past `overall_timeout` kills
/// the tool and reports [`VantageError::TimedOut`].
pub struct Tracer {
    config: TraceConfig,
    platform: Platform,
    tool: Option<ToolCommand>,
}

impl Tracer {
    pub fn new(config: TraceConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            tool: None,
        }
    }

    /// Use a specific program instead of the platform's traceroute.
    pub fn with_tool(mut self, tool: ToolCommand) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    fn command(&self, target: &ProbeTarget) -> ToolCommand {
        match &self.tool {
            Some(tool) => tool.clone().with_target(target),
            None => self.platform.traceroute_command(
                target,
                self.config.max_hops,
                self.config.wait_per_hop,
            ),
        }
    }

    pub async fn trace(&self, target: &ProbeTarget, user: UserId) -> ProbeReport<TracerouteOutcome> {
        let attempted_at = chrono::Utc::now();
        let host = target.to_string();
        let cmd = self.command(target);

        info!("Tracing route to {} (max {} hops)", host, self.config.max_hops);

        let outcome = |completed: bool, raw_output: String| TracerouteOutcome {
            target: host.clone(),
            attempted_at,
            completed,
            raw_output,
            user_id: user,
        };

        match run_with_deadline(&cmd, self.config.overall_timeout).await {
            Ok(ToolRun::Exited(output)) if output.success() => {
                info!("Traceroute to {} completed in {:?}", host, output.elapsed);
                ProbeReport::ok(outcome(true, output.stdout))
            }
            Ok(ToolRun::Exited(output)) => {
                warn!("Traceroute to {} exited with {}", host, output.status);
                ProbeReport::ok(outcome(false, output.combined()))
            }
            Ok(ToolRun::TimedOut {
                elapsed,
                partial_stdout,
                ..
            }) => {
                warn!("Traceroute to {} timed out after {:?}", host, elapsed);
                let mut raw = format!("Traceroute timed out after {} ms", elapsed.as_millis());
                if !partial_stdout.trim().is_empty() {
                    raw.push('\n');
                    raw.push_str(&partial_stdout);
                }
                ProbeReport::failed(
                    outcome(false, raw),
                    VantageError::TimedOut {
                        probe: "traceroute",
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                )
            }
            Err(e) => {
                warn!("Traceroute to {} could not run: {}", host, e);
                ProbeReport::failed(outcome(false, e.to_string()), e)
            }
        }
    }
}
