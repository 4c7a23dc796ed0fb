use chrono::Utc;
use tempfile::tempdir;
use vantage::outcome::{
    Outcome, PingOutcome, PortScanOutcome, ProbeKind, TracerouteOutcome, UserId,
};
use vantage::store::{ResultRecorder, SqliteStore};

fn scan(user: UserId, port: u16, open: bool) -> PortScanOutcome {
    PortScanOutcome {
        target: "example.com".to_string(),
        port,
        attempted_at: Utc::now(),
        is_open: open,
        service: open.then(|| "https".to_string()),
        raw_output: "Connected to 93.184.216.34:443".to_string(),
        user_id: user,
    }
}

#[test]
fn test_outcomes_round_trip_exactly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");

    let ping = PingOutcome {
        target: "192.0.2.1".to_string(),
        attempted_at: Utc::now(),
        reachable: true,
        min_rtt_ms: Some(0.412),
        avg_rtt_ms: Some(0.5),
        max_rtt_ms: Some(0.733),
        packet_loss: Some(0.25),
        raw_output: "4 packets transmitted, 3 received".to_string(),
        user_id: UserId(1),
    };
    let port_scan = scan(UserId(1), 443, true);
    let trace = TracerouteOutcome {
        target: "example.com".to_string(),
        attempted_at: Utc::now(),
        completed: false,
        raw_output: "Traceroute timed out after 30000 ms".to_string(),
        user_id: UserId(1),
    };

    {
        let store = SqliteStore::open(&path).unwrap();
        store.ensure_user(UserId(1), Some("ops@example.com")).unwrap();
        store.record(&Outcome::Ping(ping.clone())).unwrap();
        store.record(&Outcome::PortScan(port_scan.clone())).unwrap();
        store.record(&Outcome::Traceroute(trace.clone())).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let pings = store.history(UserId(1), ProbeKind::Ping, 10).unwrap();
    let scans = store.history(UserId(1), ProbeKind::PortScan, 10).unwrap();
    let traces = store.history(UserId(1), ProbeKind::Traceroute, 10).unwrap();

    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].outcome, Outcome::Ping(ping));
    assert_eq!(scans[0].outcome, Outcome::PortScan(port_scan));
    assert_eq!(traces[0].outcome, Outcome::Traceroute(trace));
}

#[test]
fn test_identical_outcomes_are_separate_records() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.ensure_user(UserId(1), None).unwrap();

    let outcome = Outcome::PortScan(scan(UserId(1), 22, false));
    let first = store.record(&outcome).unwrap();
    let second = store.record(&outcome).unwrap();
    assert_ne!(first, second);

    let rows = store.history(UserId(1), ProbeKind::PortScan, 10).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].outcome, rows[1].outcome);
}

#[test]
fn test_history_is_per_user_and_newest_first() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.ensure_user(UserId(1), None).unwrap();
    store.ensure_user(UserId(2), None).unwrap();

    store.record(&Outcome::PortScan(scan(UserId(1), 80, false))).unwrap();
    store.record(&Outcome::PortScan(scan(UserId(2), 8080, false))).unwrap();
    store.record(&Outcome::PortScan(scan(UserId(1), 443, true))).unwrap();

    let rows = store.history(UserId(1), ProbeKind::PortScan, 10).unwrap();
    let ports: Vec<u16> = rows
        .iter()
        .map(|r| match &r.outcome {
            Outcome::PortScan(o) => o.port,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    assert_eq!(ports, vec![443, 80]);

    let limited = store.history(UserId(1), ProbeKind::PortScan, 1).unwrap();
    assert_eq!(limited.len(), 1);
}
