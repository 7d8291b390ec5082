//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::DispatchStatsSnapshot;
use crate::provider::ProviderKind;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    pub providers: Vec<ProviderKind>,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub dispatch: DispatchStatsSnapshot,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.store.backend().to_string(),
        },
        providers: state.registry.list_available(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        dispatch: state.engine.stats(),
    })
}
