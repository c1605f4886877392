//! Health check and admin HTTP API

pub mod api;

#[cfg(test)]
mod tests;

pub use api::{create_router, HealthReport, MaskedUser};

use crate::admin::AdminService;
use crate::bus::Bus;
use crate::config::ServerConfig;
use crate::error::{BotError, Result};
use crate::storage::Database;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// State shared across handlers
pub struct MonitorState {
    pub db: Database,
    pub bus: Bus,
    pub admin: Arc<AdminService>,
    pub started_at: Instant,
}

impl MonitorState {
    pub fn new(db: Database, bus: Bus, admin: Arc<AdminService>) -> Self {
        Self {
            db,
            bus,
            admin,
            started_at: Instant::now(),
        }
    }
}

/// Serve until `shutdown` flips
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<MonitorState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BotError::Internal(format!("bind {}: {}", addr, e)))?;
    tracing::info!("🌐 HTTP server listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| BotError::Internal(format!("http server: {}", e)))?;

    tracing::info!("🌐 HTTP server stopped");
    Ok(())
}
