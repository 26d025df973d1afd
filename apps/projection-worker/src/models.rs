use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// Represents the 'posts' read model table
#[derive(FromRow, Debug)]
pub struct PostDetails {
    pub post_id: Uuid,
    pub author: String,
    pub date_posted: DateTime<Utc>,
    pub message: String,
    pub likes: i64,
}

// Represents the 'comments' read model table
#[derive(FromRow, Debug)]
pub struct CommentDetails {
    pub comment_id: Uuid,
    pub post_id: Uuid,
    pub username: String,
    pub comment_date: DateTime<Utc>,
    pub comment: String,
    pub edited: bool,
}
