use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{RegionProfiles, ServerConfig};

pub mod api;
pub mod routes;

/// Read-only state shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub profiles: Arc<RegionProfiles>,
    pub max_upload_bytes: usize,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            profiles: Arc::new(config.profiles),
            max_upload_bytes: config.max_upload_bytes,
            started_at: Utc::now(),
        }
    }
}

pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        max_upload_bytes = config.max_upload_bytes,
        "skuledger server listening"
    );
    axum::serve(listener, routes::router(AppState::new(config))).await
}

/// Blocking entry point for the CLI.
pub fn run_server(config: ServerConfig) -> std::io::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(config))
}
