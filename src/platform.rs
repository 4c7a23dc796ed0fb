use crate::parser::{DiagnosticParser, PosixPingParser, WindowsPingParser};
use crate::target::ProbeTarget;
use std::fmt;
use std::time::Duration;

/// Which flavour of ping/traceroute the host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// iputils ping (`-W` in seconds), traceroute
    Linux,
    /// BSD/macOS ping (`-W` in milliseconds), traceroute
    Bsd,
    /// ping.exe and tracert.exe
    Windows,
}

/// A program and its arguments, ready to hand to the process runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolCommand {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends the target as the final argument.
    pub fn with_target(mut self, target: &ProbeTarget) -> Self {
        self.args.push(target.to_string());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl Platform {
    /// The platform this binary was built for.
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Platform::Bsd
        } else {
            Platform::Linux
        }
    }

    pub fn ping_command(
        &self,
        target: &ProbeTarget,
        count: u32,
        per_packet_timeout: Duration,
    ) -> ToolCommand {
        let count = count.to_string();
        let cmd = match self {
            Platform::Linux => ToolCommand::new(
                "ping",
                ["-c".to_string(), count, "-W".to_string(), whole_secs(per_packet_timeout)],
            ),
            Platform::Bsd => {
                let program = if target.is_ipv6() { "ping6" } else { "ping" };
                ToolCommand::new(
                    program,
                    ["-c".to_string(), count, "-W".to_string(), millis(per_packet_timeout)],
                )
            }
            Platform::Windows => ToolCommand::new(
                "ping",
                ["-n".to_string(), count, "-w".to_string(), millis(per_packet_timeout)],
            ),
        };
        cmd.with_target(target)
    }

    pub fn traceroute_command(
        &self,
        target: &ProbeTarget,
        max_hops: u8,
        wait_per_hop: Duration,
    ) -> ToolCommand {
        let hops = max_hops.to_string();
        let cmd = match self {
            Platform::Linux | Platform::Bsd => {
                let mut args = vec![
                    "-m".to_string(),
                    hops,
                    "-w".to_string(),
                    whole_secs(wait_per_hop),
                ];
                if target.is_ipv6() {
                    args.insert(0, "-6".to_string());
                }
                ToolCommand::new("traceroute", args)
            }
            Platform::Windows => ToolCommand::new(
                "tracert",
                ["-h".to_string(), hops, "-w".to_string(), millis(wait_per_hop)],
            ),
        };
        cmd.with_target(target)
    }

    /// The parser matching this platform's ping output.
    pub fn ping_parser(&self) -> Box<dyn DiagnosticParser> {
        match self {
            Platform::Linux | Platform::Bsd => Box::new(PosixPingParser),
            Platform::Windows => Box::new(WindowsPingParser),
        }
    }
}

/// Seconds rounded up, never below one.
fn whole_secs(d: Duration) -> String {
    let secs = d.as_millis().div_ceil(1000).max(1);
    secs.to_string()
}

fn millis(d: Duration) -> String {
    d.as_millis().max(1).to_string()
}
