use axum::Json;

/// GET /api/health — liveness check; no auth.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
