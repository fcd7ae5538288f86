//! Ward Alerts API - Patient monitoring report service
//!
//! Serves one report to the clinical dashboard: hospitalized patients who
//! have had no lab result in the last 48 hours.
//!
//! Every request opens its own short-lived PostgreSQL connection, runs the
//! report query and closes the connection before answering.

mod alerts;
mod clock;
mod config;
mod db;
mod error;
mod routes;
mod state;

use crate::config::Settings;
use crate::db::Database;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env, which may set RUST_LOG)
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Ward Alerts API...");
    info!("📋 Configuration loaded successfully");

    let database = Database::new(settings.database.clone());

    // The report answers 503 on its own while the database is down, so a
    // failed check is not fatal
    match database.ping().await {
        Ok(check) => info!(
            "✅ Database reachable at {} ({} ms, {})",
            database.target(),
            check.latency_ms,
            check.server_version
        ),
        Err(e) => warn!("⚠️  Database not reachable at startup: {}", e),
    }

    let state = Arc::new(AppState::new(database));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  {}", routes::HOSPITALIZED_PATIENTS_NEW_TEST_REQUIRED);
    info!("   GET  /health                   - Liveness");
    info!("   GET  /health/db                - Database readiness");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging. `LOG_FORMAT=json` switches
/// to one JSON object per line.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ward_alerts=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
