use crate::AppState;
use crate::application::error_response;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

// POST /api/v1/restore-read-db
//
// Re-publishes the full history of every active post so the projection
// worker can rebuild the read model from scratch. Write-side data is never
// touched.
pub async fn handle_restore_read_db(State(state): State<AppState>) -> impl IntoResponse {
    info!("read model restore requested");
    match state.post_handler.republish_all().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "event streams republished" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}
