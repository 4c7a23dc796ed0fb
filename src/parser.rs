use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

static POSIX_REPLY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time([=<])\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("posix reply pattern compiles")
});

static POSIX_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
        .expect("posix summary pattern compiles")
});

static WINDOWS_REPLY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)time([=<])\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("windows reply pattern compiles")
});

static WINDOWS_SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Sent = (\d+), Received = (\d+)").expect("windows summary pattern compiles")
});

/// Counters and per-reply round-trip times read from ping output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStats {
    pub transmitted: Option<u32>,
    pub received: Option<u32>,
    /// One entry per echo reply, in milliseconds
    pub rtts_ms: Vec<f64>,
}

impl PingStats {
    /// True when nothing at all was recognised.
    pub fn is_unknown(&self) -> bool {
        self.transmitted.is_none() && self.received.is_none() && self.rtts_ms.is_empty()
    }
}

/// Turns raw diagnostic text into structured fields.
pub trait DiagnosticParser: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn parse_ping(&self, output: &str) -> PingStats;
}

/// iputils, BSD/macOS and busybox `ping`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixPingParser;

impl DiagnosticParser for PosixPingParser {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn parse_ping(&self, output: &str) -> PingStats {
        let mut stats = PingStats::default();

        for line in output.lines() {
            if line.contains("bytes from") {
                if let Some(rtt) = reply_rtt(&POSIX_REPLY_RE, line) {
                    stats.rtts_ms.push(rtt);
                }
            } else if let Some(caps) = POSIX_SUMMARY_RE.captures(line) {
                stats.transmitted = caps[1].parse().ok();
                stats.received = caps[2].parse().ok();
            }
        }

        stats
    }
}

/// Windows `ping.exe`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPingParser;

impl DiagnosticParser for WindowsPingParser {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn parse_ping(&self, output: &str) -> PingStats {
        let mut stats = PingStats::default();
        let mut summary_seen = false;

        for line in output.lines() {
            if line.trim_start().starts_with("Reply from") {
                if let Some(rtt) = reply_rtt(&WINDOWS_REPLY_RE, line) {
                    stats.rtts_ms.push(rtt);
                }
            } else if let Some(caps) = WINDOWS_SUMMARY_RE.captures(line) {
                stats.transmitted = caps[1].parse().ok();
                summary_seen = true;
            }
        }

        // "Destination host unreachable" replies count as received in the
        // summary, only timed replies are real echoes.
        if summary_seen {
            stats.received = Some(stats.rtts_ms.len() as u32);
        }

        stats
    }
}

/// Round-trip time of one reply line.
///
/// `time<N` only bounds the value, so it is recorded as the midpoint `N / 2`.
fn reply_rtt(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let value = caps[2].parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)?;
    if &caps[1] == "<" {
        Some(value / 2.0)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.
64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=11.8 ms
64 bytes from 1.1.1.1: icmp_seq=2 ttl=57 time=12.4 ms
64 bytes from 1.1.1.1: icmp_seq=4 ttl=57 time=10.9 ms

--- 1.1.1.1 ping statistics ---
4 packets transmitted, 3 received, 25% packet loss, time 3004ms
rtt min/avg/max/mdev = 10.900/11.700/12.400/0.616 ms
";

    const LINUX_DOWN: &str = "PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.

--- 10.255.255.1 ping statistics ---
2 packets transmitted, 0 received, 100% packet loss, time 1010ms
";

    const MACOS_OK: &str = "PING example.com (93.184.216.34): 56 data bytes
64 bytes from 93.184.216.34: icmp_seq=0 ttl=56 time=88.120 ms
64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=87.004 ms

--- example.com ping statistics ---
2 packets transmitted, 2 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 87.004/87.562/88.120/0.558 ms
";

    const WINDOWS_OK: &str = "
Pinging 8.8.8.8 with 32 bytes of data:
Reply from 8.8.8.8: bytes=32 time=14ms TTL=117
Reply from 8.8.8.8: bytes=32 time<1ms TTL=117
Request timed out.
Reply from 192.168.1.1: Destination host unreachable.

Ping statistics for 8.8.8.8:
    Packets: Sent = 4, Received = 3, Lost = 1 (25% loss),
";

    #[test]
    fn test_linux_partial_loss() {
        let stats = PosixPingParser.parse_ping(LINUX_OK);
        assert_eq!(stats.transmitted, Some(4));
        assert_eq!(stats.received, Some(3));
        assert_eq!(stats.rtts_ms, vec![11.8, 12.4, 10.9]);
    }

    #[test]
    fn test_linux_unreachable() {
        let stats = PosixPingParser.parse_ping(LINUX_DOWN);
        assert_eq!(stats.transmitted, Some(2));
        assert_eq!(stats.received, Some(0));
        assert!(stats.rtts_ms.is_empty());
    }

    #[test]
    fn test_macos_summary() {
        let stats = PosixPingParser.parse_ping(MACOS_OK);
        assert_eq!(stats.transmitted, Some(2));
        assert_eq!(stats.received, Some(2));
        assert_eq!(stats.rtts_ms.len(), 2);
    }

    #[test]
    fn test_windows_ignores_unreachable_replies() {
        let stats = WindowsPingParser.parse_ping(WINDOWS_OK);
        assert_eq!(stats.transmitted, Some(4));
        assert_eq!(stats.received, Some(2));
        assert_eq!(stats.rtts_ms, vec![14.0, 0.5]);
    }

    #[test]
    fn test_sub_millisecond_reply_is_below_bound() {
        let stats = WindowsPingParser.parse_ping("Reply from 10.0.0.1: bytes=32 time<1ms TTL=64\n");
        assert_eq!(stats.rtts_ms, vec![0.5]);
        assert!(stats.rtts_ms[0] < 1.0);

        let stats = PosixPingParser.parse_ping("64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=1.0 ms\n");
        assert_eq!(stats.rtts_ms, vec![1.0]);
    }

    #[test]
    fn test_unrecognised_text() {
        let stats = PosixPingParser.parse_ping("ping: unknown host nowhere.test\n");
        assert!(stats.is_unknown());
        assert!(WindowsPingParser.parse_ping("").is_unknown());
    }
}
