//! # Storefront API
//!
//! HTTP server for checkout: order placement plus the read-only lookups the
//! checkout page needs.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API Server                            │
//! │                                                                         │
//! │  Browser ───► HTTP (8080) ───► routes ───► storefront-checkout ───► SQLite
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                                         notification outbox drain       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_checkout::{CheckoutConfig, LocalBackend, LogSender, NotificationDispatcher};
use storefront_db::Database;

use crate::routes::ApiState;

/// How often queued order confirmations are sent.
const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn")),
        )
        .init();

    info!("Starting storefront API server...");

    let config = CheckoutConfig::load().context("loading configuration")?;
    info!(
        bind = %config.bind_address,
        database = %config.database_path,
        tax_bps = config.tax_rate_bps,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    info!("Database ready");

    let (drain_shutdown_tx, drain_shutdown_rx) = mpsc::channel::<()>(1);
    let drain = if config.notifications_enabled {
        let dispatcher = NotificationDispatcher::new(&db, true);
        Some(tokio::spawn(dispatcher.run(
            Arc::new(LogSender),
            NOTIFICATION_POLL_INTERVAL,
            drain_shutdown_rx,
        )))
    } else {
        warn!("Order notifications disabled");
        None
    };

    let state = Arc::new(ApiState {
        backend: LocalBackend::from_config(db.clone(), &config, None),
        pricing: config.pricing_engine(),
    });

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(addr = %config.bind_address, "HTTP server listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    if let Some(drain) = drain {
        let _ = drain_shutdown_tx.send(()).await;
        if let Err(e) = drain.await {
            warn!(error = %e, "Notification drain task ended abnormally");
        }
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
