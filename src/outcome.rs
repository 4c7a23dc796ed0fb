use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an authenticated user, supplied by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row id assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one ping probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingOutcome {
    pub target: String,
    pub attempted_at: DateTime<Utc>,
    pub reachable: bool,
    /// Round-trip times in milliseconds, over received replies only
    pub min_rtt_ms: Option<f64>,
    pub avg_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    /// Fraction of packets lost (0.0 - 1.0)
    pub packet_loss: Option<f64>,
    pub raw_output: String,
    pub user_id: UserId,
}

impl PingOutcome {
    /// An outcome for a probe that got no reply at all.
    pub fn unreachable(
        target: String,
        attempted_at: DateTime<Utc>,
        raw_output: String,
        user_id: UserId,
    ) -> Self {
        PingOutcome {
            target,
            attempted_at,
            reachable: false,
            min_rtt_ms: None,
            avg_rtt_ms: None,
            max_rtt_ms: None,
            packet_loss: Some(1.0),
            raw_output,
            user_id,
        }
    }
}

/// Result of one TCP connect probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortScanOutcome {
    pub target: String,
    pub port: u16,
    pub attempted_at: DateTime<Utc>,
    pub is_open: bool,
    pub service: Option<String>,
    pub raw_output: String,
    pub user_id: UserId,
}

/// Result of one traceroute run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteOutcome {
    pub target: String,
    pub attempted_at: DateTime<Utc>,
    pub completed: bool,
    pub raw_output: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Ping,
    PortScan,
    Traceroute,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Ping => "ping",
            ProbeKind::PortScan => "port_scan",
            ProbeKind::Traceroute => "traceroute",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any of the three outcome kinds, as handed to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Ping(PingOutcome),
    PortScan(PortScanOutcome),
    Traceroute(TracerouteOutcome),
}

impl Outcome {
    pub fn kind(&self) -> ProbeKind {
        match self {
            Outcome::Ping(_) => ProbeKind::Ping,
            Outcome::PortScan(_) => ProbeKind::PortScan,
            Outcome::Traceroute(_) => ProbeKind::Traceroute,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Outcome::Ping(o) => o.user_id,
            Outcome::PortScan(o) => o.user_id,
            Outcome::Traceroute(o) => o.user_id,
        }
    }

    pub fn attempted_at(&self) -> DateTime<Utc> {
        match self {
            Outcome::Ping(o) => o.attempted_at,
            Outcome::PortScan(o) => o.attempted_at,
            Outcome::Traceroute(o) => o.attempted_at,
        }
    }
}

impl From<PingOutcome> for Outcome {
    fn from(o: PingOutcome) -> Self {
        Outcome::Ping(o)
    }
}

impl From<PortScanOutcome> for Outcome {
    fn from(o: PortScanOutcome) -> Self {
        Outcome::PortScan(o)
    }
}

impl From<TracerouteOutcome> for Outcome {
    fn from(o: TracerouteOutcome) -> Self {
        Outcome::Traceroute(o)
    }
}

/// An outcome as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredOutcome {
    pub id: RecordId,
    /// Server-assigned insertion time
    pub recorded_at: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// What an executor hands back: always an outcome to persist, plus the
/// failure to surface when the probe did not run to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport<O> {
    pub outcome: O,
    pub failure: Option<crate::error::VantageError>,
}

impl<O> ProbeReport<O> {
    pub fn ok(outcome: O) -> Self {
        ProbeReport {
            outcome,
            failure: None,
        }
    }

    pub fn failed(outcome: O, failure: crate::error::VantageError) -> Self {
        ProbeReport {
            outcome,
            failure: Some(failure),
        }
    }
}
