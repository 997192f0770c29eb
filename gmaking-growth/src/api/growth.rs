//! Character growth endpoints
//!
//! POST /api/v1/grow-character runs one growth transaction and returns the
//! evolved image with the new stat totals.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::models::{GrowthRequest, GrowthResponse};
use crate::AppState;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "AI Image and Growth Server is running" }))
}

/// POST /api/v1/grow-character
pub async fn grow_character(
    State(state): State<AppState>,
    payload: Result<Json<GrowthRequest>, JsonRejection>,
) -> ApiResult<Json<GrowthResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    match state.growth.evolve_character(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            let reason = err.to_string();
            tracing::error!(
                user_id = %request.user_id,
                character_id = request.character_id,
                error = %reason,
                "Character growth failed"
            );
            state.record_error(reason).await;
            Err(err.into())
        }
    }
}

/// Build growth routes
pub fn growth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/v1/grow-character", post(grow_character))
}
