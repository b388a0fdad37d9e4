//! C1 Echo component binary.
//!
//! Connects to RabbitMQ, registers into the MOV and echoes messages until
//! Ctrl+C or SIGTERM, then unregisters and closes the connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use c1_echo::{App, Cli};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use valawai_channel::AmqpChannel;
use valawai_component::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing(&cli.log_config());

    if let Err(e) = run(&cli).await {
        error!("Could not start the component: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let amqp = cli.amqp_config();
    info!(uri = %amqp.redacted_uri(), version = env!("CARGO_PKG_VERSION"), "Starting C1 Echo");

    let asyncapi_yaml = cli.asyncapi_yaml()?;
    let channel = AmqpChannel::connect(amqp)
        .await
        .context("Failed to connect to RabbitMQ")?;

    let app = App::start(
        Arc::new(channel),
        &cli.component_config(),
        env!("CARGO_PKG_VERSION"),
        asyncapi_yaml,
    )
    .await?;

    app.run_until(shutdown_signal()).await
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
