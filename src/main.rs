use anyhow::{Context, Result};
use booking_loadgen::{client, config, session, telemetry};
use client::HttpBookingClient;
use config::Config;
use std::sync::Arc;
use telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Err(e) = dotenv {
        debug!(error = %e, "no .env file loaded, using process environment");
    }

    let cfg = Config::load().context("failed to load configuration")?;
    let client = HttpBookingClient::from_config(&cfg)?;

    info!(
        target_url = %client.booking_url(),
        mode = %cfg.target.mode,
        virtual_users = cfg.load.virtual_users,
        iterations_per_user = cfg.load.iterations_per_user,
        max_duration_seconds = cfg.load.max_duration_seconds,
        "starting booking load run"
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            telemetry::shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let report = session::run_session(&cfg, Arc::new(client), shutdown).await;
    println!("{}", report.render(cfg.report.format)?);
    Ok(())
}
