//! Health check endpoint
//!
//! # Endpoint
//!
//! ```text
//! GET /health
//! ```
//!
//! # Response
//!
//! ```text
//! {
//!   "status": "healthy",
//!   "version": "0.1.0",
//!   "database": "connected",
//!   "connections": { "pools_created": 2, "pools_reused": 40, ... }
//! }
//! ```
//!
//! Always 200; a failing master database shows as `degraded`.

use axum::{extract::State, Json};
use erp_shared::data::{ConnectionStats, DataBackend};
use serde::Serialize;
use tracing::warn;

use crate::{app::AppState, error::ApiResult};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// Master database status
    pub database: String,

    /// Tenant database connection counters
    pub connections: ConnectionStats,
}

pub async fn health_check<B: DataBackend>(
    State(state): State<AppState<B>>,
) -> ApiResult<Json<HealthResponse>> {
    let connected = match state.backend.check_master().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Master database check failed");
            false
        }
    };

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        connections: state.backend.connection_stats(),
    }))
}
