use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdminStats, Category, Comment, CommentView, Like, NewComment, NewPost, NewUser, Post,
    PostChanges, PostSummary, RecentComment, Tag, User, UserSummary,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Failures of the persistence collaborator. Guarded actions map every variant
/// except `UniqueViolation` to a generic user-facing message.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("unique constraint `{0}` violated")]
    UniqueViolation(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return RepositoryError::UniqueViolation(
                    db.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        RepositoryError::Database(e)
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract for users, posts, comments, likes and taxonomy.
/// Handlers and guarded actions only see this trait, so the Postgres store and
/// the in-memory store are interchangeable.
///
/// Methods that mutate by id do not check ownership: that is the guard's job,
/// performed on a freshly fetched record right before the call.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Newest first, with post/comment counts.
    async fn list_recent_users(&self, limit: i64) -> RepoResult<Vec<UserSummary>>;

    // --- Posts ---
    // Published only, newest `published_at` first.
    async fn list_published_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>>;
    // Drafts included, newest first.
    async fn list_posts_by_author(&self, author_id: Uuid) -> RepoResult<Vec<PostSummary>>;
    // Every post regardless of status, newest first. Admin listing.
    async fn list_recent_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>>;
    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>>;
    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>>;
    // Fails with `UniqueViolation` when the slug is taken.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> RepoResult<Option<Post>>;
    // Cascades to comments, likes and taxonomy links.
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool>;
    async fn increment_view_count(&self, id: Uuid) -> RepoResult<()>;
    async fn post_categories(&self, post_id: Uuid) -> RepoResult<Vec<Category>>;
    async fn post_tags(&self, post_id: Uuid) -> RepoResult<Vec<Tag>>;
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn list_tags(&self) -> RepoResult<Vec<Tag>>;

    // --- Comments ---
    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    // Cascades to replies.
    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool>;
    // All comments of a post with author names, newest first.
    async fn list_comments(&self, post_id: Uuid) -> RepoResult<Vec<CommentView>>;
    async fn list_recent_comments(&self, limit: i64) -> RepoResult<Vec<RecentComment>>;

    // --- Likes ---
    async fn find_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<Like>>;
    // Returns false when the (user, post) pair already exists.
    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<bool>;
    async fn delete_like(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_likes(&self, post_id: Uuid) -> RepoResult<i64>;

    // --- Moderation ---
    async fn get_stats(&self) -> RepoResult<AdminStats>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
