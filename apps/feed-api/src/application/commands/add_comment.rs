use crate::AppState;
use crate::application::error_response;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct AddCommentDto {
    pub comment: String,
    pub username: String,
}

// POST /api/v1/posts/{post_id}/comments
pub async fn handle_add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<AddCommentDto>,
) -> impl IntoResponse {
    let mut post = match state.post_handler.get_by_id(post_id).await {
        Ok(post) => post,
        Err(err) => return error_response(err),
    };

    let comment_id = match post.add_comment(&payload.comment, &payload.username) {
        Ok(comment_id) => comment_id,
        Err(err) => return error_response(err.into()),
    };

    match state.post_handler.save(&mut post).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "comment_id": comment_id })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}
