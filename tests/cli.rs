use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use vantage::cli::{Cli, Command, HistoryKind};
use vantage::outcome::ProbeKind;

#[test]
fn test_cli_parsing() {
    let cli = Cli::parse_from(["vantage", "--user", "3", "ping", "192.168.1.1"]);

    assert_eq!(cli.user, Some(3));
    assert_eq!(cli.config, None);
    assert_eq!(cli.db, None);
    assert!(!cli.json);
    match cli.command {
        Command::Ping {
            host,
            count,
            timeout,
        } => {
            assert_eq!(host, "192.168.1.1");
            assert_eq!(count, None);
            assert_eq!(timeout, None);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_cli_with_options() {
    let cli = Cli::parse_from([
        "vantage",
        "scan",
        "example.com",
        "443",
        "--timeout",
        "0.5",
        "--db",
        "/tmp/results.db",
        "-j",
        "-u",
        "9",
    ]);

    assert!(cli.json);
    assert_eq!(cli.user, Some(9));
    assert_eq!(cli.db, Some(PathBuf::from("/tmp/results.db")));

    let settings = cli.settings().unwrap();
    assert_eq!(settings.port_scan.connect_timeout, Duration::from_millis(500));
    assert_eq!(settings.storage.database, PathBuf::from("/tmp/results.db"));
    match cli.command {
        Command::Scan { host, port, .. } => {
            assert_eq!(host, "example.com");
            assert_eq!(port, "443");
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_trace_overrides() {
    let cli = Cli::parse_from([
        "vantage", "trace", "example.com", "--max-hops", "12", "--timeout", "45",
    ]);
    let settings = cli.settings().unwrap();

    assert_eq!(settings.traceroute.max_hops, 12);
    assert_eq!(settings.traceroute.overall_timeout, Duration::from_secs(45));
    assert_eq!(settings.ping.count, 4);
}

#[test]
fn test_ping_overrides_and_invalid_timeout() {
    let cli = Cli::parse_from(["vantage", "ping", "example.com", "-n", "2", "--timeout", "1"]);
    let settings = cli.settings().unwrap();
    assert_eq!(settings.ping.count, 2);
    assert_eq!(settings.ping.per_packet_timeout, Duration::from_secs(1));

    let cli = Cli::parse_from(["vantage", "ping", "example.com", "--timeout=-1"]);
    assert!(cli.settings().is_err());
}

#[test]
fn test_history_kind() {
    let cli = Cli::parse_from(["vantage", "history", "scan", "--limit", "5"]);
    match cli.command {
        Command::History { kind, limit } => {
            assert_eq!(kind, Some(HistoryKind::Scan));
            assert_eq!(limit, Some(5));
            assert_eq!(ProbeKind::from(HistoryKind::Scan), ProbeKind::PortScan);
        }
        other => panic!("unexpected command {:?}", other),
    }

    let cli = Cli::parse_from(["vantage", "history"]);
    assert!(matches!(
        cli.command,
        Command::History {
            kind: None,
            limit: None
        }
    ));
}

#[test]
fn test_settings_file_with_cli_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[ping]\ncount = 6\n\n[storage]\ndatabase = \"from-file.db\"\n"
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cli = Cli::parse_from(["vantage", "--config", path.as_str(), "ping", "example.com"]);
    let settings = cli.settings().unwrap();
    assert_eq!(settings.ping.count, 6);
    assert_eq!(settings.storage.database, PathBuf::from("from-file.db"));

    let cli = Cli::parse_from([
        "vantage",
        "--config",
        path.as_str(),
        "ping",
        "example.com",
        "--count",
        "1",
    ]);
    assert_eq!(cli.settings().unwrap().ping.count, 1);
}

#[test]
fn test_missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["vantage"]).is_err());
    assert!(Cli::try_parse_from(["vantage", "scan", "example.com"]).is_err());
    assert!(Cli::try_parse_from(["vantage", "history", "dns"]).is_err());
}
