use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use content_vault::{
    api::create_router,
    application::{builder::ApplicationBuilder, rate_limiter::RateLimiter},
    config::CliOverrides,
    Config,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

/// Periodically forget idle addresses so the limiter map stays bounded
fn spawn_limiter_reaper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    max_idle: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    limiter.prune_idle(max_idle);
                }
            }
        }
    });
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, abandoning in-flight uploads");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting content_vault service");

    let cli = CliOverrides::parse();
    let config = Config::from_env().with_overrides(cli);
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    info!(backend = config.backend.as_str(), "Configuration loaded and validated");

    let shutdown = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::new(config.limiter_options()));

    let state = ApplicationBuilder::new(config.clone())
        .with_shutdown(shutdown.clone())
        .with_limiter(Arc::clone(&limiter))
        .with_storage()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize storage")?
        .build()
        .map_err(|e| anyhow::anyhow!(e))?;

    spawn_limiter_reaper(
        limiter,
        Duration::from_secs(config.limiter_prune_interval_secs),
        Duration::from_secs(config.limiter_idle_secs),
        shutdown.clone(),
    );

    let app = create_router(state);

    info!("Listening on {}", config.listen_addr);
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("Server stopped");
    Ok(())
}
