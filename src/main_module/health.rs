//! Health check handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::config::StoreBackend;
use crate::shared::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let backend = match state.config.store.backend {
        StoreBackend::Postgrest => "postgrest",
        StoreBackend::Memory => "memory",
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "claimdesk",
            "version": env!("CARGO_PKG_VERSION"),
            "store": backend,
            "table": state.store.table()
        })),
    )
}
