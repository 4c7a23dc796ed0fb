use crate::error::VantageError;
use crate::outcome::{
    Outcome, PingOutcome, PortScanOutcome, ProbeKind, RecordId, StoredOutcome, TracerouteOutcome,
    UserId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Persists outcomes. Implementations must only ever insert.
pub trait ResultRecorder: Send + Sync {
    /// Appends one outcome, failed probes included.
    fn record(&self, outcome: &Outcome) -> Result<RecordId, VantageError>;

    /// A user's outcomes of one kind, newest first.
    fn history(
        &self,
        user: UserId,
        kind: ProbeKind,
        limit: usize,
    ) -> Result<Vec<StoredOutcome>, VantageError>;
}

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id      INTEGER PRIMARY KEY,
    email   TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS ping_results (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(id),
    target       TEXT NOT NULL,
    attempted_at TEXT NOT NULL,
    reachable    INTEGER NOT NULL,
    min_rtt_ms   REAL,
    avg_rtt_ms   REAL,
    max_rtt_ms   REAL,
    packet_loss  REAL,
    raw_output   TEXT NOT NULL,
    recorded_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS port_scan_results (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(id),
    target       TEXT NOT NULL,
    port         INTEGER NOT NULL CHECK (port BETWEEN 1 AND 65535),
    attempted_at TEXT NOT NULL,
    is_open      INTEGER NOT NULL,
    service      TEXT,
    raw_output   TEXT NOT NULL,
    recorded_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS traceroute_results (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(id),
    target       TEXT NOT NULL,
    attempted_at TEXT NOT NULL,
    completed    INTEGER NOT NULL,
    raw_output   TEXT NOT NULL,
    recorded_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_ping_results_user ON ping_results(user_id, id);
CREATE INDEX IF NOT EXISTS idx_port_scan_results_user ON port_scan_results(user_id, id);
CREATE INDEX IF NOT EXISTS idx_traceroute_results_user ON traceroute_results(user_id, id);
";

const RESULT_TABLES: [&str; 3] = ["ping_results", "port_scan_results", "traceroute_results"];

/// Triggers refusing UPDATE and DELETE on every result table.
fn append_only_triggers() -> String {
    RESULT_TABLES
        .iter()
        .flat_map(|table| {
            ["UPDATE", "DELETE"].into_iter().map(move |op| {
                format!(
                    "CREATE TRIGGER IF NOT EXISTS {table}_no_{lower} BEFORE {op} ON {table} \
                     BEGIN SELECT RAISE(ABORT, '{table} is append-only'); END;\n",
                    lower = op.to_lowercase()
                )
            })
        })
        .collect()
}

/// SQLite-backed recorder. One connection, serialized by a mutex; every
/// insert is its own implicit transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, VantageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                VantageError::Persistence(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize(conn).inspect(|_| debug!("Result store opened at {}", path.display()))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, VantageError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, VantageError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&append_only_triggers())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, VantageError> {
        self.conn
            .lock()
            .map_err(|_| VantageError::Persistence("store lock poisoned".to_string()))
    }

    /// Makes sure a user row exists so results can reference it.
    pub fn ensure_user(&self, user: UserId, email: Option<&str>) -> Result<(), VantageError> {
        self.lock()?.execute(
            "INSERT OR IGNORE INTO users (id, email) VALUES (?1, ?2)",
            params![user.0, email],
        )?;
        Ok(())
    }

    fn insert(conn: &Connection, outcome: &Outcome) -> rusqlite::Result<i64> {
        match outcome {
            Outcome::Ping(o) => conn.execute(
                "INSERT INTO ping_results (user_id, target, attempted_at, reachable, \
                 min_rtt_ms, avg_rtt_ms, max_rtt_ms, packet_loss, raw_output) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    o.user_id.0,
                    o.target,
                    format_ts(&o.attempted_at),
                    o.reachable,
                    o.min_rtt_ms,
                    o.avg_rtt_ms,
                    o.max_rtt_ms,
                    o.packet_loss,
                    o.raw_output,
                ],
            ),
            Outcome::PortScan(o) => conn.execute(
                "INSERT INTO port_scan_results (user_id, target, port, attempted_at, is_open, \
                 service, raw_output) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    o.user_id.0,
                    o.target,
                    o.port,
                    format_ts(&o.attempted_at),
                    o.is_open,
                    o.service,
                    o.raw_output,
                ],
            ),
            Outcome::Traceroute(o) => conn.execute(
                "INSERT INTO traceroute_results (user_id, target, attempted_at, completed, \
                 raw_output) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    o.user_id.0,
                    o.target,
                    format_ts(&o.attempted_at),
                    o.completed,
                    o.raw_output,
                ],
            ),
        }?;
        Ok(conn.last_insert_rowid())
    }
}

impl ResultRecorder for SqliteStore {
    fn record(&self, outcome: &Outcome) -> Result<RecordId, VantageError> {
        let conn = self.lock()?;
        let id = Self::insert(&conn, outcome)?;
        debug!(
            "Recorded {} result #{} for user {}",
            outcome.kind(),
            id,
            outcome.user_id()
        );
        Ok(RecordId(id))
    }

    fn history(
        &self,
        user: UserId,
        kind: ProbeKind,
        limit: usize,
    ) -> Result<Vec<StoredOutcome>, VantageError> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let (sql, map): (&str, fn(&Row<'_>) -> rusqlite::Result<Outcome>) = match kind {
            ProbeKind::Ping => (
                "SELECT id, recorded_at, user_id, target, attempted_at, reachable, min_rtt_ms, \
                 avg_rtt_ms, max_rtt_ms, packet_loss, raw_output FROM ping_results \
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                ping_from_row,
            ),
            ProbeKind::PortScan => (
                "SELECT id, recorded_at, user_id, target, attempted_at, port, is_open, service, \
                 raw_output FROM port_scan_results WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                port_scan_from_row,
            ),
            ProbeKind::Traceroute => (
                "SELECT id, recorded_at, user_id, target, attempted_at, completed, raw_output \
                 FROM traceroute_results WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                traceroute_from_row,
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user.0, limit], |row| {
            Ok(StoredOutcome {
                id: RecordId(row.get(0)?),
                recorded_at: row.get(1)?,
                outcome: map(row)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VantageError::from)
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ping_from_row(row: &Row<'_>) -> rusqlite::Result<Outcome> {
    Ok(Outcome::Ping(PingOutcome {
        user_id: UserId(row.get(2)?),
        target: row.get(3)?,
        attempted_at: parse_ts(row, 4)?,
        reachable: row.get(5)?,
        min_rtt_ms: row.get(6)?,
        avg_rtt_ms: row.get(7)?,
        max_rtt_ms: row.get(8)?,
        packet_loss: row.get(9)?,
        raw_output: row.get(10)?,
    }))
}

fn port_scan_from_row(row: &Row<'_>) -> rusqlite::Result<Outcome> {
    Ok(Outcome::PortScan(PortScanOutcome {
        user_id: UserId(row.get(2)?),
        target: row.get(3)?,
        attempted_at: parse_ts(row, 4)?,
        port: row.get(5)?,
        is_open: row.get(6)?,
        service: row.get(7)?,
        raw_output: row.get(8)?,
    }))
}

fn traceroute_from_row(row: &Row<'_>) -> rusqlite::Result<Outcome> {
    Ok(Outcome::Traceroute(TracerouteOutcome {
        user_id: UserId(row.get(2)?),
        target: row.get(3)?,
        attempted_at: parse_ts(row, 4)?,
        completed: row.get(5)?,
        raw_output: row.get(6)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_user(UserId(1), Some("ops@example.com")).unwrap();
        store
    }

    fn trace(user: UserId) -> Outcome {
        Outcome::Traceroute(TracerouteOutcome {
            target: "example.com".to_string(),
            attempted_at: Utc::now(),
            completed: true,
            raw_output: " 1  192.0.2.1  0.4 ms".to_string(),
            user_id: user,
        })
    }

    #[test]
    fn test_rows_cannot_be_changed() {
        let store = store();
        store.record(&trace(UserId(1))).unwrap();

        let conn = store.lock().unwrap();
        assert!(conn.execute("UPDATE traceroute_results SET completed = 0", []).is_err());
        assert!(conn.execute("DELETE FROM traceroute_results", []).is_err());
    }

    #[test]
    fn test_unknown_user_is_persistence_error() {
        let store = store();
        let err = store.record(&trace(UserId(99))).unwrap_err();
        assert!(matches!(err, VantageError::Persistence(_)));
    }

    #[test]
    fn test_recorded_at_is_assigned() {
        let store = store();
        store.record(&trace(UserId(1))).unwrap();
        let rows = store.history(UserId(1), ProbeKind::Traceroute, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].recorded_at.ends_with('Z'));
    }
}
