use crate::error::VantageError;
use crate::outcome::{PingOutcome, PortScanOutcome, RecordId, StoredOutcome, TracerouteOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A probe request body: `{"host": ..., "port": ...}`.
///
/// Fields are kept loosely typed so a wrong type is reported as a bad
/// request rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeRequest {
    #[serde(default)]
    pub host: Option<Value>,
    #[serde(default)]
    pub port: Option<Value>,
}

impl ProbeRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(Value::String(host.into())),
            port: None,
        }
    }

    pub fn with_port(mut self, port: impl Into<Value>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn from_json(body: &str) -> Result<Self, VantageError> {
        serde_json::from_str(body)
            .map_err(|e| VantageError::Validation(format!("invalid request body: {}", e)))
    }

    pub fn host(&self) -> Result<&str, VantageError> {
        match &self.host {
            None | Some(Value::Null) => Err(VantageError::Validation("Host is required".into())),
            Some(Value::String(host)) => Ok(host),
            Some(_) => Err(VantageError::Validation("host must be a string".into())),
        }
    }

    /// The port as 1..=65535; numeric strings are accepted as form inputs send them.
    pub fn port(&self) -> Result<u16, VantageError> {
        let invalid = || VantageError::Validation("port must be between 1 and 65535".into());
        let port = match &self.port {
            None | Some(Value::Null) => {
                return Err(VantageError::Validation("Port is required".into()));
            }
            Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid)?,
            Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid())?,
            Some(_) => return Err(invalid()),
        };
        match u16::try_from(port) {
            Ok(p) if p != 0 => Ok(p),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingResponse {
    pub host: String,
    pub status: &'static str,
    pub success: bool,
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub packet_loss: Option<f64>,
    pub raw_output: String,
    pub record_id: Option<RecordId>,
}

impl PingResponse {
    pub fn new(o: &PingOutcome, record_id: Option<RecordId>) -> Self {
        Self {
            host: o.target.clone(),
            status: if o.reachable { "online" } else { "offline" },
            success: o.reachable,
            min: o.min_rtt_ms,
            avg: o.avg_rtt_ms,
            max: o.max_rtt_ms,
            packet_loss: o.packet_loss,
            raw_output: o.raw_output.clone(),
            record_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortScanResponse {
    pub host: String,
    pub port: u16,
    pub status: &'static str,
    pub open: bool,
    pub service: Option<String>,
    pub raw_output: String,
    pub record_id: Option<RecordId>,
}

impl PortScanResponse {
    pub fn new(o: &PortScanOutcome, record_id: Option<RecordId>) -> Self {
        Self {
            host: o.target.clone(),
            port: o.port,
            status: if o.is_open { "open" } else { "closed" },
            open: o.is_open,
            service: o.service.clone(),
            raw_output: o.raw_output.clone(),
            record_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracerouteResponse {
    pub host: String,
    pub status: &'static str,
    pub completed: bool,
    pub raw_output: String,
    pub record_id: Option<RecordId>,
}

impl TracerouteResponse {
    pub fn new(o: &TracerouteOutcome, record_id: Option<RecordId>) -> Self {
        Self {
            host: o.target.clone(),
            status: if o.completed { "completed" } else { "incomplete" },
            completed: o.completed,
            raw_output: o.raw_output.clone(),
            record_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub host: Option<String>,
    pub status: &'static str,
    pub error: String,
    /// Tool output captured before the failure, if any
    pub raw_output: Option<String>,
    /// Set when the failed attempt was still recorded
    pub record_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<StoredOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    Ping(PingResponse),
    PortScan(PortScanResponse),
    Traceroute(TracerouteResponse),
    History(HistoryResponse),
    Error(ErrorResponse),
}

/// A status code plus body, as the HTTP layer would send it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn ok(body: ResponseBody) -> Self {
        Self { status: 200, body }
    }

    /// An error response for a failure that left nothing behind.
    pub fn error(host: Option<String>, err: &VantageError) -> Self {
        Self::failed(host, err, None, None)
    }

    /// An error response for a probe whose failed attempt may have been kept.
    pub fn failed(
        host: Option<String>,
        err: &VantageError,
        raw_output: Option<String>,
        record_id: Option<RecordId>,
    ) -> Self {
        let status = if err.is_timeout() { "timeout" } else { "error" };
        Self {
            status: err.status_code(),
            body: ResponseBody::Error(ErrorResponse {
                host,
                status,
                error: err.to_string(),
                raw_output,
                record_id,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!("{{\"status\":500,\"body\":{{\"kind\":\"error\",\"error\":\"{}\"}}}}", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_mistyped_host() {
        let req = ProbeRequest::from_json("{}").unwrap();
        assert_eq!(req.host().unwrap_err().to_string(), "Host is required");

        let req = ProbeRequest::from_json(r#"{"host": 42}"#).unwrap();
        assert_eq!(req.host().unwrap_err().status_code(), 400);

        assert!(ProbeRequest::from_json("not json").is_err());
    }

    #[test]
    fn test_port_forms() {
        assert_eq!(ProbeRequest::new("a.co").with_port(443).port().unwrap(), 443);
        assert_eq!(ProbeRequest::new("a.co").with_port("8080").port().unwrap(), 8080);
        assert!(ProbeRequest::new("a.co").with_port(0).port().is_err());
        assert!(ProbeRequest::new("a.co").with_port(65536).port().is_err());
        assert!(ProbeRequest::new("a.co").with_port(-1).port().is_err());
        assert!(ProbeRequest::new("a.co").with_port("http").port().is_err());
        assert!(ProbeRequest::new("a.co").with_port(json!(80.5)).port().is_err());
        assert_eq!(
            ProbeRequest::new("a.co").port().unwrap_err().to_string(),
            "Port is required"
        );
    }

    #[test]
    fn test_error_body_shape() {
        let err = VantageError::TimedOut {
            probe: "traceroute",
            elapsed_ms: 30_000,
        };
        let resp = ApiResponse::failed(
            Some("example.com".into()),
            &err,
            Some("Traceroute timed out".into()),
            Some(RecordId(4)),
        );
        assert_eq!(resp.status, 504);
        let value: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert_eq!(value["body"]["kind"], "error");
        assert_eq!(value["body"]["status"], "timeout");
        assert_eq!(value["body"]["record_id"], 4);
    }
}
