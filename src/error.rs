use thiserror::Error;

/// Every failure a probe request can end in.
///
/// Validation and auth failures stop a request before anything runs.
/// `Resolution`, `TimedOut` and `Execution` come out of the executors;
/// `Persistence` comes out of the recorder and is logged rather than
/// returned to the caller by the orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VantageError {
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },
    #[error("{probe} timed out after {elapsed_ms} ms")]
    TimedOut { probe: &'static str, elapsed_ms: u64 },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl VantageError {
    /// HTTP-equivalent status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            VantageError::Validation(_) | VantageError::Resolution { .. } => 400,
            VantageError::Unauthorized => 401,
            VantageError::TimedOut { .. } => 504,
            VantageError::Execution(_) | VantageError::Persistence(_) => 500,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VantageError::TimedOut { .. })
    }
}

impl From<rusqlite::Error> for VantageError {
    fn from(e: rusqlite::Error) -> Self {
        VantageError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(VantageError::Validation("invalid host".into()).status_code(), 400);
        assert_eq!(VantageError::Unauthorized.status_code(), 401);
        assert_eq!(
            VantageError::Resolution {
                host: "nowhere.test".into(),
                reason: "no records".into()
            }
            .status_code(),
            400
        );
        assert_eq!(
            VantageError::TimedOut {
                probe: "traceroute",
                elapsed_ms: 30_000
            }
            .status_code(),
            504
        );
        assert_eq!(VantageError::Execution("spawn".into()).status_code(), 500);
    }

    #[test]
    fn test_display() {
        let e = VantageError::TimedOut {
            probe: "ping",
            elapsed_ms: 1500,
        };
        assert_eq!(e.to_string(), "ping timed out after 1500 ms");
        assert!(e.is_timeout());
    }
}
