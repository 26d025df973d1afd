pub mod add_comment;
pub mod create_post;
pub mod delete_post;
pub mod edit_comment;
pub mod edit_message;
pub mod like_post;
pub mod remove_comment;
pub mod restore_read_db;
