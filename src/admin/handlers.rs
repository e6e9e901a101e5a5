use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::load_balancer::ServiceSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: state.selector.services().count(),
    })
}

/// Breaker state of every backend, grouped by service.
pub async fn get_backends(State(state): State<AppState>) -> Json<Vec<ServiceSnapshot>> {
    Json(state.selector.snapshot())
}
