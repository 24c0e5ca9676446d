//! Arena lobby HTTP server.

use anyhow::Context;
use arena_lobby::server::{build_router, shutdown_signal};
use arena_lobby::{Arena, Config};
use arena_runtime::metrics::MetricsExporter;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena_lobby=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting arena lobby server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        users_url = %config.upstream.users_url,
        tickets_url = %config.upstream.tickets_url,
        game_servers = config.upstream.game_servers.len(),
        "Configuration loaded"
    );

    let metrics = if config.server.metrics_enabled {
        Some(MetricsExporter::install().context("failed to install metrics recorder")?)
    } else {
        None
    };

    let arena = Arena::from_config(&config).context("failed to wire services")?;
    let state = arena.state(metrics);
    let app = build_router(state);

    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = tokio::spawn(arena.worker.run(stop_rx));
    info!("Reconciliation loop spawned");

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped, stopping reconciliation loop");
    let _ = stop_tx.send(true);
    match tokio::time::timeout(config.shutdown_timeout(), worker).await {
        Ok(Ok(())) => info!("Reconciliation loop stopped"),
        Ok(Err(err)) => warn!(error = %err, "Reconciliation loop task failed"),
        Err(_) => warn!("Reconciliation loop did not stop in time"),
    }

    Ok(())
}
