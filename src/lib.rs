//! logsleuth -- hybrid log anomaly detection and root-cause ranking.
//!
//! This crate provides feature extraction for log records, a rule scorer and
//! an isolation-forest outlier model reconciled into one verdict per record,
//! a pattern-scored root-cause classifier, and a thin HTTP shell with an
//! SQLite-backed analysis history.

pub mod api;
pub mod config;
pub mod detect;
pub mod features;
pub mod record;
pub mod rootcause;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::detect::engine::AnalysisEngine;
use crate::storage::history::AnalysisStore;

/// Start the analysis service: storage, engine, and API server.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Initialize Storage
    let db_path = config.server.db_path.clone();
    tracing::info!(db_path = %db_path.display(), "Initializing database");
    let pool = storage::open_pool(&db_path)?;

    // 2. Load or prepare the outlier model
    let engine_config = config.clone();
    let engine = tokio::task::spawn_blocking(move || AnalysisEngine::new(&engine_config))
        .await
        .context("engine startup task panicked")??;

    // 3. Start API Server
    let state = api::state::AppState {
        engine: Arc::new(engine),
        store: AnalysisStore::new(pool),
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    tracing::info!(%addr, "logsleuth listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("logsleuth stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
