use crate::error::VantageError;
use crate::outcome::{PingOutcome, ProbeReport, UserId};
use crate::parser::{DiagnosticParser, PingStats};
use crate::platform::{Platform, ToolCommand};
use crate::process::{ToolRun, run_with_deadline};
use crate::target::ProbeTarget;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the ping executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Number of echo requests to send
    pub count: u32,
    /// How long to wait for each reply
    #[serde(with = "crate::config::duration_secs")]
    pub per_packet_timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 4,
            per_packet_timeout: Duration::from_secs(2),
        }
    }
}

/// Gap the ping binaries leave between echo requests.
const SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Slack for process start-up and the final summary.
const DEADLINE_SLACK: Duration = Duration::from_secs(1);

impl PingConfig {
    /// Hard deadline for the whole run.
    ///
    /// Requests go out at least `SEND_INTERVAL` apart, and the last one may
    /// wait a full `per_packet_timeout` for its reply.
    pub fn overall_timeout(&self) -> Duration {
        let gaps = self.count.max(1) - 1;
        self.per_packet_timeout.max(SEND_INTERVAL) * gaps + self.per_packet_timeout + DEADLINE_SLACK
    }
}

/// Figures derived from parsed ping output.
#[derive(Debug, Clone, PartialEq)]
pub struct PingFigures {
    pub reachable: bool,
    pub min_rtt_ms: Option<f64>,
    pub avg_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub packet_loss: Option<f64>,
}

/// Aggregates parsed stats into outcome fields.
///
/// RTTs are taken over received replies only. When nothing was recognised
/// the tool's exit status decides reachability and the loss stays unknown
/// unless the host is unreachable.
pub fn aggregate(stats: &PingStats, requested: u32, exit_success: bool) -> PingFigures {
    if stats.is_unknown() {
        return PingFigures {
            reachable: exit_success,
            min_rtt_ms: None,
            avg_rtt_ms: None,
            max_rtt_ms: None,
            packet_loss: if exit_success { None } else { Some(1.0) },
        };
    }

    let sent = stats.transmitted.unwrap_or(requested).max(1);
    let received = stats
        .received
        .unwrap_or(stats.rtts_ms.len() as u32)
        .min(sent);
    let loss = ((sent - received) as f64 / sent as f64).clamp(0.0, 1.0);

    let (min, avg, max) = if received == 0 || stats.rtts_ms.is_empty() {
        (None, None, None)
    } else {
        let rtts = &stats.rtts_ms;
        let min = rtts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rtts.iter().copied().fold(0.0_f64, f64::max);
        let avg = rtts.iter().sum::<f64>() / rtts.len() as f64;
        (Some(min), Some(avg), Some(max))
    };

    PingFigures {
        reachable: received > 0,
        min_rtt_ms: min,
        avg_rtt_ms: avg,
        max_rtt_ms: max,
        packet_loss: Some(loss),
    }
}

/// Runs ping probes.
pub struct Pinger {
    config: PingConfig,
    platform: Platform,
    parser: Box<dyn DiagnosticParser>,
    /// Replaces the platform command line; the target is still appended
    tool: Option<ToolCommand>,
}

impl Pinger {
    pub fn new(config: PingConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            parser: platform.ping_parser(),
            tool: None,
        }
    }

    /// Use a specific program instead of the platform's ping.
    pub fn with_tool(mut self, tool: ToolCommand) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    fn command(&self, target: &ProbeTarget) -> ToolCommand {
        match &self.tool {
            Some(tool) => tool.clone().with_target(target),
            None => self.platform.ping_command(
                target,
                self.config.count.max(1),
                self.config.per_packet_timeout,
            ),
        }
    }

    /// Pings `target` on behalf of `user`.
    ///
    /// Always yields an outcome. An unreachable or unresolvable host is a
    /// normal `reachable = false` outcome; a tool that could not be started
    /// or overran its deadline is also reported as the report's failure.
    pub async fn ping(&self, target: &ProbeTarget, user: UserId) -> ProbeReport<PingOutcome> {
        let attempted_at = chrono::Utc::now();
        let host = target.to_string();
        let cmd = self.command(target);
        let deadline = self.config.overall_timeout();

        info!("Pinging {} ({} packets)", host, self.config.count);

        match run_with_deadline(&cmd, deadline).await {
            Ok(ToolRun::Exited(output)) => {
                let raw_output = output.combined();
                let stats = self.parser.parse_ping(&raw_output);
                debug!("Parsed ping output for {}: {:?}", host, stats);
                let figures = aggregate(&stats, self.config.count.max(1), output.success());

                info!(
                    "Ping {} finished: reachable={} loss={:?}",
                    host, figures.reachable, figures.packet_loss
                );

                ProbeReport::ok(PingOutcome {
                    target: host,
                    attempted_at,
                    reachable: figures.reachable,
                    min_rtt_ms: figures.min_rtt_ms,
                    avg_rtt_ms: figures.avg_rtt_ms,
                    max_rtt_ms: figures.max_rtt_ms,
                    packet_loss: figures.packet_loss,
                    raw_output,
                    user_id: user,
                })
            }
            Ok(ToolRun::TimedOut {
                elapsed,
                partial_stdout,
                ..
            }) => {
                warn!("Ping to {} timed out after {:?}", host, elapsed);
                // Replies printed before the kill still count.
                let stats = self.parser.parse_ping(&partial_stdout);
                let figures = aggregate(&stats, self.config.count.max(1), false);

                let mut raw_output = format!("Ping timed out after {} ms", elapsed.as_millis());
                if !partial_stdout.trim().is_empty() {
                    raw_output.push('\n');
                    raw_output.push_str(&partial_stdout);
                }
                ProbeReport::failed(
                    PingOutcome {
                        target: host,
                        attempted_at,
                        reachable: figures.reachable,
                        min_rtt_ms: figures.min_rtt_ms,
                        avg_rtt_ms: figures.avg_rtt_ms,
                        max_rtt_ms: figures.max_rtt_ms,
                        packet_loss: figures.packet_loss,
                        raw_output,
                        user_id: user,
                    },
                    VantageError::TimedOut {
                        probe: "ping",
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                )
            }
            Err(e) => {
                warn!("Ping to {} could not run: {}", host, e);
                ProbeReport::failed(
                    PingOutcome::unreachable(host, attempted_at, e.to_string(), user),
                    e,
                )
            }
        }
    }
}
