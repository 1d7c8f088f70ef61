//! Health check endpoint

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::app::AppState;
use crate::services::{HealthStatus, ServiceHealth};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub services: BTreeMap<String, ServiceHealth>,
}

/// Worst status across all services; healthy when there are none.
fn overall(services: &BTreeMap<String, ServiceHealth>) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    for health in services.values() {
        match health.status {
            HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
            HealthStatus::Degraded => status = HealthStatus::Degraded,
            HealthStatus::Healthy => {}
        }
    }
    status
}

/// Service health; 503 when any service is unhealthy
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let services = state.services.health_all().await;
    let status = overall(&services);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            services,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
