use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// The RBAC field stored on every user record. Maps to the Postgres enum `user_role`
/// and is serialized in upper case ("USER", "MODERATOR", "ADMIN") on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
    sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// The canonical identity record from the `users` table. The password hash never
/// leaves the server: it is skipped by serde and only read by the login action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A blog post from the `posts` table. `slug` is unique across all posts and is the
/// key of the public detail page (`/post/{slug}`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    // FK to users.id (Owner).
    pub author_id: Uuid,
    pub view_count: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostSummary
///
/// Listing row used by the home page, the dashboard and the admin page.
/// Joined with the author's name and aggregated like/comment counts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Uuid,
    pub author_name: String,
    pub view_count: i32,
    pub like_count: i64,
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A row of the `comments` table. `parent_id` makes comments self-referential:
/// a reply points at the comment it answers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CommentView
///
/// A comment joined with its author's display name, as listed on a post page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RecentComment
///
/// Moderation feed row for the admin page: the comment plus who wrote it and on what.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecentComment {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub post_title: String,
    pub author_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Like
///
/// One row of `likes`. The pair (user_id, post_id) is unique at the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq, Eq)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq, Eq)]
#[ts(export)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// UserSummary
///
/// Admin listing row: a user with how many posts and comments they have written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub post_count: i64,
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Write Models (Repository Inputs) ---

/// NewUser
///
/// Insert payload for `create_user`; the password is already hashed at this point.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Label
///
/// A category or tag as submitted with a post: the name as the author typed it and
/// the slug it is keyed by. Existing rows keep their name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    pub name: String,
    pub slug: String,
}

/// NewPost
///
/// Insert payload for `create_post`. Categories and tags are connected to
/// existing rows by slug or created on the fly.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Uuid,
    pub categories: Vec<Label>,
    pub tags: Vec<Label>,
}

/// PostChanges
///
/// Full replacement of a post's editable fields. `categories`/`tags` replace the
/// existing links only when `Some`.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Option<Vec<Label>>,
    pub tags: Option<Vec<Label>>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterInput
///
/// Public registration form. The password is hashed before it reaches the store
/// and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginInput
///
/// Credentials form. `callback_url` is where the caller wanted to go before the
/// gate sent them to `/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// PostInput
///
/// Payload for create and update post. Missing strings deserialize to empty so the
/// schema reports the field's own message instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default, rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// CommentInput
///
/// Payload for create comment. `parent_id` is set when replying to another comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentInput {
    pub content: String,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

// --- Dashboard & Admin Schemas (Output) ---

/// DashboardStats
///
/// Aggregates shown on the author's dashboard, computed from their own posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub draft_posts: i64,
    pub total_likes: i64,
}

/// AdminStats
///
/// Site-wide counters for the moderation dashboard (GET /admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_comments: i64,
}
