use std::process::ExitCode;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_sync::config::Config;
use ledger_sync::ingest::{IngestController, RunState};
use ledger_sync::sink::{HubStore, RecordSink};
use ledger_sync::source::WsLedgerClient;
use ledger_sync::types::LedgerIndex;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    info!(
        start = %config.start_ledger,
        stop = ?config.stop_ledger,
        node = %config.node_url,
        "Starting ledger sync"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Gracefully shutting down");
            shutdown.cancel();
        }
    });

    let source = WsLedgerClient::connect(&config.node_url, config.request_timeout, &shutdown)
        .await
        .context("failed to connect to ledger node")?;
    let store = HubStore::connect(&config.hub)
        .await
        .context("failed to connect to document store hub")?;

    let mut controller = IngestController::new(
        source,
        RecordSink::new(store),
        RunState::new(config.start_ledger, config.stop_ledger),
        shutdown,
    );
    let result = controller.run().await;
    controller.source().close();

    report_resume_point(controller.state().last_completed());
    result.context("ingestion aborted")?;
    Ok(())
}

fn report_resume_point(last_completed: Option<LedgerIndex>) {
    if let Some(last) = last_completed {
        info!(last_ledger = %last, resume = %last.next(), "Run finished");
    }
    for line in resume_lines(last_completed) {
        println!("{line}");
    }
}

/// The operator-facing lines naming where the next run should start.
fn resume_lines(last_completed: Option<LedgerIndex>) -> Vec<String> {
    match last_completed {
        Some(last) => vec![
            format!("Last ledger: {last}"),
            format!("Run your next job with LEDGER={}", last.next()),
        ],
        None => vec!["No ledger was completed".to_string()],
    }
}

/// Completes when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!(signal = "SIGINT", "shutdown signal"),
            _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("shutdown signal");
    }
}
