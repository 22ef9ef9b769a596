//! Relief Desk admin API server.
//!
//! Connects to `PostgreSQL`, applies migrations, exposes Prometheus metrics
//! on `METRICS_PORT` and serves the admin API on `PORT`.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use relief_desk_core::metrics::register_release_metrics;
use relief_desk_core::{ReleaseEnvironment, ReleaseServices, SystemClock, TracingNotificationSink};
use relief_desk_postgres::{
    PostgresCapacityStore, PostgresRequestStore, PostgresStaffingStore, connect, migrate,
};
use relief_desk_web::{AppState, Config, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relief_desk=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Relief Desk server");

    let config = Config::from_env();
    config.validate()?;
    info!(
        api_addr = %config.server.api_addr(),
        metrics_addr = %config.server.metrics_addr(),
        operating_weekdays = %config.release.operating_weekdays,
        "Configuration loaded"
    );

    install_metrics(config.server.metrics_addr())?;

    let pool = connect(&config.database.url, config.database.max_connections).await?;
    if config.database.run_migrations {
        migrate(&pool).await?;
        info!("Migrations applied");
    }

    let env = ReleaseEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(PostgresRequestStore::from_pool(pool.clone())),
        Arc::new(PostgresCapacityStore::from_pool(pool.clone())),
        Arc::new(PostgresStaffingStore::from_pool(pool)),
        Arc::new(TracingNotificationSink),
    );
    let services = ReleaseServices::new(env.clone(), config.release.clone())?;
    let app = build_router(AppState::new(env, services));

    let addr = config.server.api_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Install the Prometheus recorder with its scrape endpoint.
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        )?
        .install()?;

    register_release_metrics();
    info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
