use crate::AppState;
use crate::application::error_response;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

// PUT /api/v1/posts/{post_id}/like
pub async fn handle_like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut post = match state.post_handler.get_by_id(post_id).await {
        Ok(post) => post,
        Err(err) => return error_response(err),
    };

    if let Err(err) = post.like_post() {
        return error_response(err.into());
    }

    match state.post_handler.save(&mut post).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}
