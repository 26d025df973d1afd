use crate::AppState;
use crate::application::error_response;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct DeletePostDto {
    pub username: String,
}

// DELETE /api/v1/posts/{post_id}
pub async fn handle_delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<DeletePostDto>,
) -> impl IntoResponse {
    let mut post = match state.post_handler.get_by_id(post_id).await {
        Ok(post) => post,
        Err(err) => return error_response(err),
    };

    if let Err(err) = post.delete_post(&payload.username) {
        return error_response(err.into());
    }

    match state.post_handler.save(&mut post).await {
        Ok(()) => {
            info!(%post_id, "post removed");
            StatusCode::OK.into_response()
        }
        Err(err) => error_response(err),
    }
}
