use crate::api::response::ApiResponse;
use crate::AppState;
use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthData {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<ApiResponse<HealthData>> {
    ApiResponse::ok(HealthData {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
