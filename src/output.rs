use crate::api::{ApiResponse, ResponseBody};
use crate::outcome::{Outcome, StoredOutcome};
use colored::Colorize;

/// Prints a response for a terminal reader.
pub fn print_response(response: &ApiResponse) {
    match &response.body {
        ResponseBody::Ping(ping) => {
            let status = if ping.success {
                "reachable".green().bold()
            } else {
                "unreachable".red().bold()
            };
            println!("Host {} is {}", ping.host.bold(), status);
            if let (Some(min), Some(avg), Some(max)) = (ping.min, ping.avg, ping.max) {
                println!("RTT min/avg/max: {:.3}/{:.3}/{:.3} ms", min, avg, max);
            }
            if let Some(loss) = ping.packet_loss {
                println!("Packet loss: {:.1}%", loss * 100.0);
            }
            print_raw(&ping.raw_output);
        }
        ResponseBody::PortScan(scan) => {
            let status = if scan.open {
                "OPEN".green().bold()
            } else {
                "CLOSED".red().bold()
            };
            println!("Port {} on {} is {}", scan.port, scan.host.bold(), status);
            if let Some(service) = &scan.service {
                println!("Service: {}", service.cyan());
            }
            print_raw(&scan.raw_output);
        }
        ResponseBody::Traceroute(trace) => {
            let status = if trace.completed {
                "completed".green().bold()
            } else {
                "did not complete".yellow().bold()
            };
            println!("Traceroute to {} {}", trace.host.bold(), status);
            print_raw(&trace.raw_output);
        }
        ResponseBody::History(history) => {
            if history.entries.is_empty() {
                println!("No recorded results");
            }
            for entry in &history.entries {
                println!("{}", history_line(entry));
            }
        }
        ResponseBody::Error(err) => {
            let label = format!("Error ({})", response.status).red().bold();
            match &err.host {
                Some(host) => eprintln!("{} {}: {}", label, host, err.error),
                None => eprintln!("{} {}", label, err.error),
            }
            if let Some(raw) = &err.raw_output {
                print_raw(raw);
            }
        }
    }
}

fn print_raw(raw: &str) {
    if raw.trim().is_empty() {
        return;
    }
    println!("{}", "Output:".dimmed());
    for line in raw.lines() {
        println!("  {}", line);
    }
}

/// One-line summary of a stored outcome.
pub fn history_line(entry: &StoredOutcome) -> String {
    let when = entry.outcome.attempted_at().format("%Y-%m-%d %H:%M:%S");
    let summary = match &entry.outcome {
        Outcome::Ping(o) => match (o.reachable, o.avg_rtt_ms) {
            (true, Some(avg)) => format!("ping  {} reachable, avg {:.2} ms", o.target, avg),
            (true, None) => format!("ping  {} reachable", o.target),
            (false, _) => format!("ping  {} unreachable", o.target),
        },
        Outcome::PortScan(o) => format!(
            "scan  {}:{} {}{}",
            o.target,
            o.port,
            if o.is_open { "open" } else { "closed" },
            o.service
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default()
        ),
        Outcome::Traceroute(o) => format!(
            "trace {} {}",
            o.target,
            if o.completed { "completed" } else { "incomplete" }
        ),
    };
    format!("#{:<5} {} {}", entry.id.0, when, summary)
}
