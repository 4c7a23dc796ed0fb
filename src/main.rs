use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use vantage::api::{ApiResponse, ProbeRequest};
use vantage::cli::{Cli, Command};
use vantage::config::Settings;
use vantage::orchestrator::{Orchestrator, ProbeContext};
use vantage::outcome::UserId;
use vantage::output;
use vantage::platform::Platform;
use vantage::session::StaticSession;
use vantage::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Command::Config = cli.command {
        print!("{}", Settings::sample());
        return Ok(());
    }

    let settings = cli.settings()?;
    let platform = Platform::detect();
    debug!("Detected platform {:?}", platform);

    let store = SqliteStore::open(&settings.storage.database).with_context(|| {
        format!(
            "Failed to open result store {}",
            settings.storage.database.display()
        )
    })?;

    let session = match cli.user {
        Some(id) => {
            let user = UserId(id);
            store
                .ensure_user(user, None)
                .with_context(|| format!("Failed to register user {}", user))?;
            StaticSession::user(user)
        }
        None => StaticSession::anonymous(),
    };

    let ctx = ProbeContext::from_settings(&settings, platform, Arc::new(store), Arc::new(session));
    let orchestrator = Orchestrator::new(ctx);

    let spinner = if cli.json {
        None
    } else {
        spinner_for(&cli.command)
    };

    let response = run(&orchestrator, &cli.command).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if cli.json {
        println!("{}", response.to_json());
    } else {
        output::print_response(&response);
    }

    if !response.is_success() {
        info!("Request finished with status {}", response.status);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(orchestrator: &Orchestrator, command: &Command) -> ApiResponse {
    match command {
        Command::Ping { host, .. } => orchestrator.ping(&ProbeRequest::new(host.as_str())).await,
        Command::Scan { host, port, .. } => {
            let req = ProbeRequest::new(host.as_str()).with_port(port.as_str());
            orchestrator.port_scan(&req).await
        }
        Command::Trace { host, .. } => {
            orchestrator
                .traceroute(&ProbeRequest::new(host.as_str()))
                .await
        }
        Command::History { kind, limit } => {
            orchestrator.history(kind.map(Into::into), *limit).await
        }
        Command::Config => unreachable!("handled before the store is opened"),
    }
}

fn spinner_for(command: &Command) -> Option<ProgressBar> {
    let message = match command {
        Command::Ping { host, .. } => format!("Pinging {}", host),
        Command::Scan { host, port, .. } => format!("Probing {}:{}", host, port),
        Command::Trace { host, .. } => format!("Tracing route to {}", host),
        Command::History { .. } | Command::Config => return None,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.bold().to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}
