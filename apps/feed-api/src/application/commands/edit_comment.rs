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
pub struct EditCommentDto {
    pub comment: String,
    pub username: String,
}

// PUT /api/v1/posts/{post_id}/comments/{comment_id}
pub async fn handle_edit_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<EditCommentDto>,
) -> impl IntoResponse {
    let mut post = match state.post_handler.get_by_id(post_id).await {
        Ok(post) => post,
        Err(err) => return error_response(err),
    };

    if let Err(err) = post.edit_comment(comment_id, &payload.comment, &payload.username) {
        return error_response(err.into());
    }

    match state.post_handler.save(&mut post).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}
