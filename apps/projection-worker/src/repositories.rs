use chrono::{DateTime, Utc};
use feed_core::CoreError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CommentDetails, PostDetails};

fn infra(err: sqlx::Error) -> CoreError {
    CoreError::Infrastructure(Box::new(err))
}

/// Write access to the 'posts' read model table. Every operation is
/// idempotent so redelivered or republished events settle on the same rows.
#[derive(Clone)]
pub struct PostReadRepository {
    pool: PgPool,
}

impl PostReadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, post: &PostDetails) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO posts (post_id, author, date_posted, message, likes) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (post_id) DO UPDATE \
             SET author = EXCLUDED.author, date_posted = EXCLUDED.date_posted, \
                 message = EXCLUDED.message, likes = EXCLUDED.likes",
        )
        .bind(post.post_id)
        .bind(&post.author)
        .bind(post.date_posted)
        .bind(&post.message)
        .bind(post.likes)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    pub async fn update_message(&self, post_id: Uuid, message: &str) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE posts SET message = $2 WHERE post_id = $1")
            .bind(post_id)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        if result.rows_affected() == 0 {
            tracing::warn!(%post_id, "message update for a post missing from the read model");
        }
        Ok(())
    }

    pub async fn add_like(&self, post_id: Uuid) -> Result<(), CoreError> {
        sqlx::query("UPDATE posts SET likes = likes + 1 WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    pub async fn delete(&self, post_id: Uuid) -> Result<(), CoreError> {
        // Comments go with the post via ON DELETE CASCADE.
        sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    pub async fn find_by_id(&self, post_id: Uuid) -> Result<Option<PostDetails>, CoreError> {
        sqlx::query_as(
            "SELECT post_id, author, date_posted, message, likes FROM posts WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }
}

/// Write access to the 'comments' read model table.
#[derive(Clone)]
pub struct CommentReadRepository {
    pool: PgPool,
}

impl CommentReadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, comment: &CommentDetails) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO comments (comment_id, post_id, username, comment_date, comment, edited) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (comment_id) DO UPDATE \
             SET comment = EXCLUDED.comment, comment_date = EXCLUDED.comment_date, \
                 edited = EXCLUDED.edited",
        )
        .bind(comment.comment_id)
        .bind(comment.post_id)
        .bind(&comment.username)
        .bind(comment.comment_date)
        .bind(&comment.comment)
        .bind(comment.edited)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }

    pub async fn update(
        &self,
        comment_id: Uuid,
        comment: &str,
        edit_date: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE comments SET comment = $2, comment_date = $3, edited = TRUE \
             WHERE comment_id = $1",
        )
        .bind(comment_id)
        .bind(comment)
        .bind(edit_date)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        if result.rows_affected() == 0 {
            tracing::warn!(%comment_id, "edit for a comment missing from the read model");
        }
        Ok(())
    }

    pub async fn delete(&self, comment_id: Uuid) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM comments WHERE comment_id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    pub async fn find_by_id(&self, comment_id: Uuid) -> Result<Option<CommentDetails>, CoreError> {
        sqlx::query_as(
            "SELECT comment_id, post_id, username, comment_date, comment, edited \
             FROM comments WHERE comment_id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)
    }
}
