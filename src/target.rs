//! Host validation.
//!
//! A [`ProbeTarget`] is the only way a user-supplied host reaches a socket
//! connect or an OS tool's command line, and it can only be built by
//! [`ProbeTarget::parse`].

use crate::error::VantageError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Characters that carry meaning to a shell.
pub const FORBIDDEN_CHARS: [char; 9] = [';', '|', '&', '`', '$', '(', ')', '<', '>'];

/// Labels of letters/digits with internal hyphens, at most 63 chars each,
/// ending in an alphabetic top-level label of 2 to 6 letters.
static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,6}$")
        .expect("hostname pattern compiles")
});

/// A host that passed validation: an IP literal or a DNS hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeTarget {
    /// An IP address (IPv4 or IPv6)
    Ip(IpAddr),
    /// A hostname (e.g., "example.com")
    Domain(String),
}

/// Why a raw host string was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub reason: &'static str,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

impl From<Rejected> for VantageError {
    fn from(r: Rejected) -> Self {
        VantageError::Validation(r.reason.to_string())
    }
}

impl ProbeTarget {
    /// Validates a raw host string.
    pub fn parse(raw: &str) -> Result<Self, Rejected> {
        let host = raw.trim();
        if host.is_empty() {
            return Err(Rejected {
                reason: "host is required",
            });
        }
        if host.contains(FORBIDDEN_CHARS) {
            return Err(Rejected {
                reason: "invalid host",
            });
        }
        if let Ok(ip) = IpAddr::from_str(host) {
            return Ok(ProbeTarget::Ip(ip));
        }
        if host.len() <= 253 && HOSTNAME_RE.is_match(host) {
            return Ok(ProbeTarget::Domain(host.to_ascii_lowercase()));
        }
        Err(Rejected {
            reason: "invalid host",
        })
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            ProbeTarget::Ip(ip) => Some(*ip),
            ProbeTarget::Domain(_) => None,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, ProbeTarget::Ip(IpAddr::V6(_)))
    }
}

/// Shorthand for [`ProbeTarget::parse`].
pub fn validate(raw: &str) -> Result<ProbeTarget, Rejected> {
    ProbeTarget::parse(raw)
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Ip(ip) => write!(f, "{}", ip),
            ProbeTarget::Domain(domain) => f.write_str(domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_every_metacharacter() {
        for c in FORBIDDEN_CHARS {
            let raw = format!("8.8.8.8{}id", c);
            assert!(ProbeTarget::parse(&raw).is_err(), "accepted {:?}", raw);
        }
        assert!(ProbeTarget::parse("8.8.8.8; rm -rf /").is_err());
        assert!(ProbeTarget::parse("$(reboot).example.com").is_err());
    }

    #[test]
    fn test_accepts_ip_literals() {
        assert_eq!(
            ProbeTarget::parse("1.2.3.4").unwrap(),
            ProbeTarget::Ip("1.2.3.4".parse().unwrap())
        );
        assert!(ProbeTarget::parse("203.0.113.5").is_ok());
        assert!(ProbeTarget::parse("::1").unwrap().is_ipv6());
        assert!(ProbeTarget::parse("2001:db8::8a2e:370:7334").is_ok());
    }

    #[test]
    fn test_hostname_grammar() {
        assert!(ProbeTarget::parse("example.com").is_ok());
        assert!(ProbeTarget::parse("a.b.co").is_ok());
        assert!(ProbeTarget::parse("my-host.internal-net.org").is_ok());
        assert_eq!(
            ProbeTarget::parse("Example.COM").unwrap().to_string(),
            "example.com"
        );

        assert!(ProbeTarget::parse("not a host!").is_err());
        assert!(ProbeTarget::parse("localhost").is_err());
        assert!(ProbeTarget::parse("-leading.com").is_err());
        assert!(ProbeTarget::parse("trailing-.com").is_err());
        assert!(ProbeTarget::parse("example.c").is_err());
        assert!(ProbeTarget::parse("example.c0m").is_err());
        assert!(ProbeTarget::parse("example..com").is_err());
        assert!(ProbeTarget::parse("example.com.").is_err());
    }

    #[test]
    fn test_label_length_limit() {
        let ok = format!("{}.com", "a".repeat(63));
        let too_long = format!("{}.com", "a".repeat(64));
        assert!(ProbeTarget::parse(&ok).is_ok());
        assert!(ProbeTarget::parse(&too_long).is_err());
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(
            ProbeTarget::parse("   ").unwrap_err().reason,
            "host is required"
        );
        assert_eq!(
            ProbeTarget::parse("  example.com ").unwrap().to_string(),
            "example.com"
        );
        assert_eq!(
            ProbeTarget::parse("exa mple.com").unwrap_err().reason,
            "invalid host"
        );
    }
}
