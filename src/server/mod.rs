//! HTTP server for the `/v2` API.
//!
//! # Endpoints
//!
//! - `POST /v2/directions/{profile}[/{format}]`, `GET /v2/directions/{profile}`
//! - `POST /v2/matrix/{profile}`
//! - `POST /v2/isochrones/{profile}`
//! - `POST /v2/snap/{profile}[/{format}]`
//! - `GET|POST /v2/match/{profile}`
//! - `POST /v2/export/{profile}`
//! - `GET /v2/status`, `GET /v2/health`
//! - `GET /swagger-ui`, `GET /v2/api-docs`
//!
//! Engine work runs on the blocking pool; the graph is shared read-only.

pub mod api;
pub mod body;
pub mod state;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::graph::RouteGraph;
pub use api::build_router;
pub use state::ServiceState;

/// Bind and serve until Ctrl-C.
pub async fn serve(graph: RouteGraph, config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(ServiceState::new(graph, config));
    let profiles: Vec<&str> = state.profiles().iter().map(|p| p.name()).collect();
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, ?profiles, "server listening");
    tracing::info!("swagger UI at http://{addr}/swagger-ui/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
        })
        .await
        .context("server error")?;
    Ok(())
}
