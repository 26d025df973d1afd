use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::AppState;

// Read-model rows maintained by the projection worker.

#[derive(sqlx::FromRow, Serialize)]
pub struct PostRow {
    pub post_id: Uuid,
    pub author: String,
    pub date_posted: DateTime<Utc>,
    pub message: String,
    pub likes: i64,
}

#[derive(sqlx::FromRow, Serialize)]
pub struct CommentRow {
    pub comment_id: Uuid,
    pub post_id: Uuid,
    pub username: String,
    pub comment_date: DateTime<Utc>,
    pub comment: String,
    pub edited: bool,
}

#[derive(Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: PostRow,
    pub comments: Vec<CommentRow>,
}

fn ensure_pool(state: &AppState) -> Result<&PgPool, StatusCode> {
    state.pg_pool.as_ref().ok_or_else(|| {
        warn!("read model queried but no database pool is configured");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

async fn attach_comments(
    pool: &PgPool,
    posts: Vec<PostRow>,
) -> Result<Vec<PostResponse>, StatusCode> {
    let post_ids: Vec<Uuid> = posts.iter().map(|p| p.post_id).collect();
    let comments: Vec<CommentRow> = sqlx::query_as(
        "SELECT comment_id, post_id, username, comment_date, comment, edited \
         FROM comments WHERE post_id = ANY($1) ORDER BY comment_date ASC",
    )
    .bind(&post_ids)
    .fetch_all(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut by_post: HashMap<Uuid, Vec<CommentRow>> = HashMap::new();
    for comment in comments {
        by_post.entry(comment.post_id).or_default().push(comment);
    }

    Ok(posts
        .into_iter()
        .map(|post| {
            let comments = by_post.remove(&post.post_id).unwrap_or_default();
            PostResponse { post, comments }
        })
        .collect())
}

// GET /api/v1/posts
pub async fn handle_find_all_posts(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = ensure_pool(&state)?;
    let posts: Vec<PostRow> = sqlx::query_as(
        "SELECT post_id, author, date_posted, message, likes FROM posts ORDER BY date_posted DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = attach_comments(pool, posts).await?;
    Ok((StatusCode::OK, Json(response)))
}

// GET /api/v1/posts/{post_id}
pub async fn handle_find_post_by_id(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = ensure_pool(&state)?;
    let post: Option<PostRow> = sqlx::query_as(
        "SELECT post_id, author, date_posted, message, likes FROM posts WHERE post_id = $1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let post = post.ok_or(StatusCode::NOT_FOUND)?;
    let mut response = attach_comments(pool, vec![post]).await?;
    Ok((StatusCode::OK, Json(response.remove(0))))
}

// GET /api/v1/posts/author/{author}
pub async fn handle_find_posts_by_author(
    State(state): State<AppState>,
    Path(author): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = ensure_pool(&state)?;
    let pattern = format!("%{author}%");
    let posts: Vec<PostRow> = sqlx::query_as(
        "SELECT post_id, author, date_posted, message, likes FROM posts \
         WHERE author ILIKE $1 ORDER BY date_posted DESC",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = attach_comments(pool, posts).await?;
    Ok((StatusCode::OK, Json(response)))
}

// GET /api/v1/posts/with-comments
pub async fn handle_find_posts_with_comments(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = ensure_pool(&state)?;
    let posts: Vec<PostRow> = sqlx::query_as(
        "SELECT p.post_id, p.author, p.date_posted, p.message, p.likes FROM posts p \
         WHERE EXISTS (SELECT 1 FROM comments c WHERE c.post_id = p.post_id) \
         ORDER BY p.date_posted DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = attach_comments(pool, posts).await?;
    Ok((StatusCode::OK, Json(response)))
}

// GET /api/v1/posts/with-likes/{count}
pub async fn handle_find_posts_with_likes(
    State(state): State<AppState>,
    Path(count): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let pool = ensure_pool(&state)?;
    let posts: Vec<PostRow> = sqlx::query_as(
        "SELECT post_id, author, date_posted, message, likes FROM posts \
         WHERE likes >= $1 ORDER BY likes DESC",
    )
    .bind(count)
    .fetch_all(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = attach_comments(pool, posts).await?;
    Ok((StatusCode::OK, Json(response)))
}
