use axum::{
    Router,
    routing::{get, post, put},
};
use feed_core::{EventSourcingHandler, domain::post::PostAggregate};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub mod application;

use application::commands::{
    add_comment::handle_add_comment, create_post::handle_create_post,
    delete_post::handle_delete_post, edit_comment::handle_edit_comment,
    edit_message::handle_edit_message, like_post::handle_like_post,
    remove_comment::handle_remove_comment, restore_read_db::handle_restore_read_db,
};
use application::query::{
    handle_find_all_posts, handle_find_post_by_id, handle_find_posts_by_author,
    handle_find_posts_with_comments, handle_find_posts_with_likes,
};

// Holds shared dependencies
#[derive(Clone)]
pub struct AppState {
    pub post_handler: Arc<EventSourcingHandler<PostAggregate>>,
    pub pg_pool: Option<PgPool>,
}

// Build the Axum router. Command routes run the load -> command -> save cycle
// against the event store; query routes read the Postgres read model.
pub fn create_app(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/posts", post(handle_create_post).get(handle_find_all_posts))
        .route(
            "/posts/{post_id}",
            get(handle_find_post_by_id).delete(handle_delete_post),
        )
        .route("/posts/{post_id}/message", put(handle_edit_message))
        .route("/posts/{post_id}/like", put(handle_like_post))
        .route("/posts/{post_id}/comments", post(handle_add_comment))
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(handle_edit_comment).delete(handle_remove_comment),
        )
        .route("/posts/author/{author}", get(handle_find_posts_by_author))
        .route("/posts/with-comments", get(handle_find_posts_with_comments))
        .route(
            "/posts/with-likes/{count}",
            get(handle_find_posts_with_likes),
        )
        .route("/restore-read-db", post(handle_restore_read_db));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .with_state(app_state)
}
