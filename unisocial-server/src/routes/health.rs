use axum::Json;
use unisocial_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("unisocial-server", env!("CARGO_PKG_VERSION")))
}
