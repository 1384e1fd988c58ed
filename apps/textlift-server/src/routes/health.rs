//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::OcrBackendKind;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub engines: Vec<OcrBackendKind>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "textlift-server",
        engines: state.available_engines().await,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
