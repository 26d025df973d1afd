use crate::{AggregateRoot, CoreError, DomainEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// --- Events ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum PostEvent {
    PostCreated {
        id: Uuid,
        author: String,
        message: String,
        date_posted: DateTime<Utc>,
    },
    MessageUpdated {
        id: Uuid,
        message: String,
    },
    PostLiked {
        id: Uuid,
    },
    CommentAdded {
        id: Uuid,
        comment_id: Uuid,
        comment: String,
        username: String,
        comment_date: DateTime<Utc>,
    },
    CommentUpdated {
        id: Uuid,
        comment_id: Uuid,
        comment: String,
        username: String,
        edit_date: DateTime<Utc>,
    },
    CommentRemoved {
        id: Uuid,
        comment_id: Uuid,
    },
    PostRemoved {
        id: Uuid,
    },
}

impl DomainEvent for PostEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PostEvent::PostCreated { .. } => "PostCreated",
            PostEvent::MessageUpdated { .. } => "MessageUpdated",
            PostEvent::PostLiked { .. } => "PostLiked",
            PostEvent::CommentAdded { .. } => "CommentAdded",
            PostEvent::CommentUpdated { .. } => "CommentUpdated",
            PostEvent::CommentRemoved { .. } => "CommentRemoved",
            PostEvent::PostRemoved { .. } => "PostRemoved",
        }
    }
}

// --- Errors ---

#[derive(thiserror::Error, Debug)]
pub enum PostError {
    #[error("the post is inactive and can no longer be modified")]
    InactivePost,
    #[error("{0} cannot be empty")]
    EmptyContent(&'static str),
    #[error("comment not found (ID: {0})")]
    CommentNotFound(Uuid),
    #[error("you are not allowed to edit a {item} that was made by another user")]
    Unauthorized { item: &'static str },
}

impl From<PostError> for CoreError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Unauthorized { .. } => CoreError::Unauthorized(err.to_string()),
            PostError::CommentNotFound(id) => CoreError::NotFound(id.to_string()),
            PostError::InactivePost | PostError::EmptyContent(_) => {
                CoreError::Validation(err.to_string())
            }
        }
    }
}

// --- Aggregate ---

/// A social post and its comments. State is mutated only through `apply`;
/// the command methods below validate and raise events.
#[derive(Debug, Clone, PartialEq)]
pub struct PostAggregate {
    id: Uuid,
    version: i64,
    changes: Vec<PostEvent>,
    active: bool,
    author: String,
    message: String,
    likes: u64,
    // comment id -> (text, username)
    comments: HashMap<Uuid, (String, String)>,
}

impl Default for PostAggregate {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            version: -1,
            changes: Vec::new(),
            active: false,
            author: String::new(),
            message: String::new(),
            likes: 0,
            comments: HashMap::new(),
        }
    }
}

impl AggregateRoot for PostAggregate {
    type Event = PostEvent;

    const TYPE: &'static str = "PostAggregate";

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PostEvent::PostCreated {
                id,
                author,
                message,
                ..
            } => {
                self.id = *id;
                self.active = true;
                self.author = author.clone();
                self.message = message.clone();
            }
            PostEvent::MessageUpdated { message, .. } => {
                self.message = message.clone();
            }
            PostEvent::PostLiked { .. } => {
                self.likes += 1;
            }
            PostEvent::CommentAdded {
                comment_id,
                comment,
                username,
                ..
            } => {
                self.comments
                    .insert(*comment_id, (comment.clone(), username.clone()));
            }
            PostEvent::CommentUpdated {
                comment_id,
                comment,
                ..
            } => {
                if let Some((text, _)) = self.comments.get_mut(comment_id) {
                    *text = comment.clone();
                }
            }
            PostEvent::CommentRemoved { comment_id, .. } => {
                self.comments.remove(comment_id);
            }
            PostEvent::PostRemoved { .. } => {
                self.active = false;
            }
        }
    }

    fn uncommitted_changes(&self) -> &[Self::Event] {
        &self.changes
    }

    fn changes_mut(&mut self) -> &mut Vec<Self::Event> {
        &mut self.changes
    }
}

impl PostAggregate {
    /// Creation command: raises `PostCreated` on a fresh aggregate.
    pub fn create(id: Uuid, author: &str, message: &str) -> Result<Self, PostError> {
        if author.trim().is_empty() {
            return Err(PostError::EmptyContent("author"));
        }
        if message.trim().is_empty() {
            return Err(PostError::EmptyContent("message"));
        }
        let mut post = Self::default();
        post.raise_event(PostEvent::PostCreated {
            id,
            author: author.to_string(),
            message: message.to_string(),
            date_posted: Utc::now(),
        });
        Ok(post)
    }

    pub fn edit_message(&mut self, message: &str) -> Result<(), PostError> {
        self.ensure_active()?;
        Self::ensure_not_blank(message, "message")?;
        self.raise_event(PostEvent::MessageUpdated {
            id: self.id,
            message: message.to_string(),
        });
        Ok(())
    }

    pub fn like_post(&mut self) -> Result<(), PostError> {
        self.ensure_active()?;
        self.raise_event(PostEvent::PostLiked { id: self.id });
        Ok(())
    }

    /// Adds a comment and returns its freshly assigned identifier.
    pub fn add_comment(&mut self, comment: &str, username: &str) -> Result<Uuid, PostError> {
        self.ensure_active()?;
        Self::ensure_not_blank(comment, "comment")?;
        let comment_id = Uuid::new_v4();
        self.raise_event(PostEvent::CommentAdded {
            id: self.id,
            comment_id,
            comment: comment.to_string(),
            username: username.to_string(),
            comment_date: Utc::now(),
        });
        Ok(comment_id)
    }

    pub fn edit_comment(
        &mut self,
        comment_id: Uuid,
        comment: &str,
        username: &str,
    ) -> Result<(), PostError> {
        self.ensure_active()?;
        Self::ensure_not_blank(comment, "comment")?;
        self.ensure_comment_owner(comment_id, username)?;
        self.raise_event(PostEvent::CommentUpdated {
            id: self.id,
            comment_id,
            comment: comment.to_string(),
            username: username.to_string(),
            edit_date: Utc::now(),
        });
        Ok(())
    }

    pub fn remove_comment(&mut self, comment_id: Uuid, username: &str) -> Result<(), PostError> {
        self.ensure_active()?;
        self.ensure_comment_owner(comment_id, username)?;
        self.raise_event(PostEvent::CommentRemoved {
            id: self.id,
            comment_id,
        });
        Ok(())
    }

    pub fn delete_post(&mut self, username: &str) -> Result<(), PostError> {
        self.ensure_active()?;
        if !self.author.eq_ignore_ascii_case(username) {
            return Err(PostError::Unauthorized { item: "post" });
        }
        self.raise_event(PostEvent::PostRemoved { id: self.id });
        Ok(())
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn likes(&self) -> u64 {
        self.likes
    }

    /// Looks up a comment as (text, username).
    pub fn comment(&self, comment_id: Uuid) -> Option<(&str, &str)> {
        self.comments
            .get(&comment_id)
            .map(|(text, username)| (text.as_str(), username.as_str()))
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn ensure_active(&self) -> Result<(), PostError> {
        if !self.active {
            return Err(PostError::InactivePost);
        }
        Ok(())
    }

    fn ensure_not_blank(value: &str, field: &'static str) -> Result<(), PostError> {
        if value.trim().is_empty() {
            return Err(PostError::EmptyContent(field));
        }
        Ok(())
    }

    fn ensure_comment_owner(&self, comment_id: Uuid, username: &str) -> Result<(), PostError> {
        let (_, owner) = self
            .comments
            .get(&comment_id)
            .ok_or(PostError::CommentNotFound(comment_id))?;
        if !owner.eq_ignore_ascii_case(username) {
            return Err(PostError::Unauthorized { item: "comment" });
        }
        Ok(())
    }
}
