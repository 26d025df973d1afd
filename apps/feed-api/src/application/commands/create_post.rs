use crate::AppState;
use crate::application::error_response;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use feed_core::domain::post::PostAggregate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct NewPostDto {
    pub author: String,
    pub message: String,
}

// POST /api/v1/posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    Json(payload): Json<NewPostDto>,
) -> impl IntoResponse {
    let post_id = Uuid::new_v4();

    let mut post = match PostAggregate::create(post_id, &payload.author, &payload.message) {
        Ok(post) => post,
        Err(err) => return error_response(err.into()),
    };

    match state.post_handler.save(&mut post).await {
        Ok(()) => {
            info!(%post_id, author = %payload.author, "post created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "id": post_id })),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}
