//! Liveness and readiness endpoints

use crate::db::ConnectionCheck;
use crate::error::ApiResult;
use crate::state::SharedState;
use axum::{extract::State, Json};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Opens and closes one database connection
pub async fn database_check(State(state): State<SharedState>) -> ApiResult<Json<ConnectionCheck>> {
    let check = state.database.ping().await?;
    Ok(Json(check))
}
