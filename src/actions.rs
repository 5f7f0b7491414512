//! Guarded operations.
//!
//! Each function here is one server-side action. They take the resolved
//! [`Viewer`] and the raw payload, run the guard steps from [`crate::guard`] in
//! order, mutate through the repository, and publish the views that went stale.
//! HTTP concerns (status codes, cookies) stay in the handlers.

use axum::{Json, extract::rejection::JsonRejection};
use chrono::Utc;
use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    access::{DASHBOARD_PATH, is_local_redirect},
    auth::{AuthUser, Viewer, issue_token},
    guard::{
        Action, ActionError, Infrastructure, OwnershipFact, ensure_owner_or_admin, parse_id,
        require_session, validated,
    },
    invalidation::ViewTarget,
    models::{
        CommentInput, LoginInput, NewComment, NewPost, NewUser, PostChanges, PostInput,
        RegisterInput, Role,
    },
    repository::RepositoryError,
    validation::{non_empty, normalize_labels},
};

const POST_NOT_FOUND: &str = "Post not found";
const COMMENT_NOT_FOUND: &str = "Comment not found";
const PARENT_NOT_FOUND: &str = "Parent comment not found";
const SLUG_TAKEN: &str = "A post with this slug already exists";
const EMAIL_TAKEN: &str = "User with this email already exists";

// --- Success Payloads ---

/// Message
///
/// Success payload carrying only a human-readable message.
#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// PostSaved
///
/// Returned by create and update post.
#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PostSaved {
    pub message: String,
    pub post_id: Uuid,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub message: String,
    pub comment_id: Uuid,
}

/// LikeToggled
///
/// `liked` is the state after the toggle.
#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct LikeToggled {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoggedIn {
    pub message: String,
    pub redirect_to: String,
}

/// LoginOutcome
///
/// The reply body plus the freshly signed session token the handler turns into a
/// cookie. The token never appears in the body.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub reply: LoggedIn,
    pub token: String,
}

// Maps a store failure to the action's generic message, except a slug collision
// that slipped past the pre-check, which is a user error.
fn store_error(action: Action, e: RepositoryError) -> ActionError {
    match e {
        RepositoryError::UniqueViolation(constraint) if constraint.contains("slug") => {
            ActionError::conflict(SLUG_TAKEN)
        }
        other => ActionError::unexpected(action, other),
    }
}

async fn blocking<T, F>(action: Action, work: F) -> Result<T, ActionError>
where
    F: FnOnce() -> Result<T, crate::credentials::CredentialError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ActionError::unexpected(action, e)),
        Err(e) => Err(ActionError::unexpected(
            action,
            Infrastructure::Task(e.to_string()),
        )),
    }
}

// --- Posts ---

/// create_post
///
/// Session, schema, slug uniqueness, then insert. The post is published
/// immediately when `published` is set.
pub async fn create_post(
    state: &AppState,
    viewer: &Viewer,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<PostSaved, ActionError> {
    const ACTION: Action = Action::CreatePost;
    let user = require_session(viewer)?;
    let input = validated(payload)?;

    if state
        .repo
        .find_post_by_slug(&input.slug)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .is_some()
    {
        return Err(ActionError::conflict(SLUG_TAKEN));
    }

    let new_post = NewPost {
        title: input.title,
        slug: input.slug,
        content: input.content,
        excerpt: non_empty(&input.excerpt).map(str::to_string),
        cover_image: non_empty(&input.cover_image).map(str::to_string),
        published: input.published,
        published_at: input.published.then(Utc::now),
        author_id: user.id,
        categories: input.categories.as_deref().map(normalize_labels).unwrap_or_default(),
        tags: input.tags.as_deref().map(normalize_labels).unwrap_or_default(),
    };

    let post = state
        .repo
        .create_post(new_post)
        .await
        .map_err(|e| store_error(ACTION, e))?;

    tracing::info!(post_id = %post.id, author_id = %user.id, "post created");
    state.invalidator.publish(ViewTarget::post_created(&post.slug));

    Ok(PostSaved {
        message: "Post created successfully".to_string(),
        post_id: post.id,
    })
}

/// update_post
///
/// Session, schema, existence, ownership, then a full replacement of the editable
/// fields. `published_at` is stamped only on the draft to published transition.
pub async fn update_post(
    state: &AppState,
    viewer: &Viewer,
    raw_id: &str,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<PostSaved, ActionError> {
    const ACTION: Action = Action::UpdatePost;
    let user = require_session(viewer)?;
    let input = validated(payload)?;
    let post_id = parse_id(raw_id, POST_NOT_FOUND)?;

    let existing = state
        .repo
        .get_post(post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or_else(|| ActionError::not_found(POST_NOT_FOUND))?;

    ensure_owner_or_admin(
        user,
        OwnershipFact {
            resource_id: existing.id,
            owner_id: existing.author_id,
        },
        "You don't have permission to edit this post",
    )?;

    let published_at = if input.published && !existing.published {
        Some(Utc::now())
    } else {
        existing.published_at
    };

    let changes = PostChanges {
        title: input.title,
        slug: input.slug,
        content: input.content,
        excerpt: non_empty(&input.excerpt).map(str::to_string),
        cover_image: non_empty(&input.cover_image).map(str::to_string),
        published: input.published,
        published_at,
        categories: input.categories.as_deref().map(normalize_labels),
        tags: input.tags.as_deref().map(normalize_labels),
    };

    let post = state
        .repo
        .update_post(post_id, changes)
        .await
        .map_err(|e| store_error(ACTION, e))?
        // Deleted between the read and the write.
        .ok_or_else(|| ActionError::not_found(POST_NOT_FOUND))?;

    tracing::info!(post_id = %post.id, user_id = %user.id, "post updated");
    state
        .invalidator
        .publish(ViewTarget::post_updated(&existing.slug, &post.slug));

    Ok(PostSaved {
        message: "Post updated successfully".to_string(),
        post_id: post.id,
    })
}

/// delete_post
///
/// Session, existence, ownership, then delete. Comments, likes and taxonomy
/// links go with the post.
pub async fn delete_post(
    state: &AppState,
    viewer: &Viewer,
    raw_id: &str,
) -> Result<Message, ActionError> {
    const ACTION: Action = Action::DeletePost;
    let user = require_session(viewer)?;
    let post_id = parse_id(raw_id, POST_NOT_FOUND)?;

    let existing = state
        .repo
        .get_post(post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or_else(|| ActionError::not_found(POST_NOT_FOUND))?;

    ensure_owner_or_admin(
        user,
        OwnershipFact {
            resource_id: existing.id,
            owner_id: existing.author_id,
        },
        "You don't have permission to delete this post",
    )?;

    let deleted = state
        .repo
        .delete_post(post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?;
    if !deleted {
        return Err(ActionError::not_found(POST_NOT_FOUND));
    }

    tracing::info!(post_id = %post_id, user_id = %user.id, "post deleted");
    state
        .invalidator
        .publish(ViewTarget::post_deleted(&existing.slug));

    Ok(Message::new("Post deleted successfully"))
}

/// toggle_like
///
/// Removes the caller's like if there is one, otherwise adds it. Two concurrent
/// toggles by the same user cannot produce two likes: the store keeps
/// `(user, post)` unique and an insert that loses the race is a no-op.
pub async fn toggle_like(
    state: &AppState,
    viewer: &Viewer,
    raw_post_id: &str,
) -> Result<LikeToggled, ActionError> {
    const ACTION: Action = Action::ToggleLike;
    let user = require_session(viewer)?;
    let post_id = parse_id(raw_post_id, POST_NOT_FOUND)?;

    let post = state
        .repo
        .get_post(post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or_else(|| ActionError::not_found(POST_NOT_FOUND))?;

    let existing = state
        .repo
        .find_like(user.id, post.id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?;

    let liked = match existing {
        Some(like) => {
            state
                .repo
                .delete_like(like.id)
                .await
                .map_err(|e| ActionError::unexpected(ACTION, e))?;
            false
        }
        None => {
            let inserted = state
                .repo
                .create_like(user.id, post.id)
                .await
                .map_err(|e| ActionError::unexpected(ACTION, e))?;
            if !inserted {
                tracing::debug!(post_id = %post.id, user_id = %user.id, "concurrent like absorbed");
            }
            true
        }
    };

    state.invalidator.publish(ViewTarget::post_activity(&post.slug));
    Ok(LikeToggled { liked })
}

// --- Comments ---

/// create_comment
///
/// Session, schema, then the target post (and the parent comment for replies)
/// must exist. A parent must belong to the same post.
pub async fn create_comment(
    state: &AppState,
    viewer: &Viewer,
    payload: Result<Json<CommentInput>, JsonRejection>,
) -> Result<CommentCreated, ActionError> {
    const ACTION: Action = Action::CreateComment;
    let user = require_session(viewer)?;
    let input = validated(payload)?;
    let post_id = parse_id(&input.post_id, POST_NOT_FOUND)?;

    let post = state
        .repo
        .get_post(post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or_else(|| ActionError::not_found(POST_NOT_FOUND))?;

    let parent_id = match non_empty(&input.parent_id) {
        None => None,
        Some(raw) => {
            let parent_id = parse_id(raw, PARENT_NOT_FOUND)?;
            let parent = state
                .repo
                .get_comment(parent_id)
                .await
                .map_err(|e| ActionError::unexpected(ACTION, e))?
                .filter(|parent| parent.post_id == post.id)
                .ok_or_else(|| ActionError::not_found(PARENT_NOT_FOUND))?;
            Some(parent.id)
        }
    };

    let comment = state
        .repo
        .create_comment(NewComment {
            content: input.content,
            post_id: post.id,
            user_id: user.id,
            parent_id,
        })
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?;

    tracing::info!(comment_id = %comment.id, post_id = %post.id, "comment added");
    state.invalidator.publish(ViewTarget::post_activity(&post.slug));

    Ok(CommentCreated {
        message: "Comment added successfully".to_string(),
        comment_id: comment.id,
    })
}

/// delete_comment
///
/// Session, existence, ownership (comment author or admin), then delete. Replies
/// are removed with their parent.
pub async fn delete_comment(
    state: &AppState,
    viewer: &Viewer,
    raw_id: &str,
) -> Result<Message, ActionError> {
    const ACTION: Action = Action::DeleteComment;
    let user = require_session(viewer)?;
    let comment_id = parse_id(raw_id, COMMENT_NOT_FOUND)?;

    let existing = state
        .repo
        .get_comment(comment_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or_else(|| ActionError::not_found(COMMENT_NOT_FOUND))?;

    ensure_owner_or_admin(
        user,
        OwnershipFact {
            resource_id: existing.id,
            owner_id: existing.user_id,
        },
        "You don't have permission to delete this comment",
    )?;

    let post = state
        .repo
        .get_post(existing.post_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?;

    let deleted = state
        .repo
        .delete_comment(comment_id)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?;
    if !deleted {
        return Err(ActionError::not_found(COMMENT_NOT_FOUND));
    }

    tracing::info!(comment_id = %comment_id, user_id = %user.id, "comment deleted");
    if let Some(post) = post {
        state.invalidator.publish(ViewTarget::post_activity(&post.slug));
    }

    Ok(Message::new("Comment deleted successfully"))
}

// --- Authentication ---

/// register
///
/// Public. Schema, then email uniqueness, then the password is hashed and a
/// `USER` is created. Does not sign the new user in.
pub async fn register(
    state: &AppState,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<Message, ActionError> {
    const ACTION: Action = Action::Register;
    let input = validated(payload)?;
    let email = input.email.trim().to_lowercase();

    if state
        .repo
        .find_user_by_email(&email)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .is_some()
    {
        return Err(ActionError::conflict(EMAIL_TAKEN));
    }

    let credentials = state.credentials.clone();
    let password = input.password;
    let password_hash = blocking(ACTION, move || credentials.hash(&password)).await?;

    let user = state
        .repo
        .create_user(NewUser {
            name: input.name.trim().to_string(),
            email,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::UniqueViolation(_) => ActionError::conflict(EMAIL_TAKEN),
            other => ActionError::unexpected(ACTION, other),
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Message::new("Account created successfully"))
}

/// login
///
/// Public. Unknown email and wrong password are indistinguishable to the caller.
/// On success the caller is sent to `callbackUrl` when it is a same-origin path,
/// otherwise to the dashboard.
pub async fn login(
    state: &AppState,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<LoginOutcome, ActionError> {
    const ACTION: Action = Action::Login;
    let input = validated(payload)?;
    let email = input.email.trim().to_lowercase();

    let user = state
        .repo
        .find_user_by_email(&email)
        .await
        .map_err(|e| ActionError::unexpected(ACTION, e))?
        .ok_or(ActionError::InvalidCredentials)?;

    let credentials = state.credentials.clone();
    let password = input.password;
    let digest = user.password_hash.clone();
    let verified = blocking(ACTION, move || credentials.verify(&password, &digest)).await?;
    if !verified {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(ActionError::InvalidCredentials);
    }

    let session = AuthUser::from(user);
    let token = issue_token(&session, &state.config)
        .map_err(|e| ActionError::unexpected(ACTION, Infrastructure::Session(e.to_string())))?;

    let redirect_to = input
        .callback_url
        .as_deref()
        .filter(|target| is_local_redirect(target))
        .unwrap_or(DASHBOARD_PATH)
        .to_string();

    tracing::info!(user_id = %session.id, "user logged in");
    Ok(LoginOutcome {
        reply: LoggedIn {
            message: "Logged in successfully".to_string(),
            redirect_to,
        },
        token,
    })
}

/// logout
///
/// Always succeeds; the handler expires the session cookie.
pub fn logout(viewer: &Viewer) -> Message {
    if let Some(id) = viewer.id() {
        tracing::info!(user_id = %id, "user logged out");
    }
    Message::new("Logged out successfully")
}
