//! The per-action guard.
//!
//! Every state-mutating operation runs the same checks, in this order, before it
//! touches persisted state:
//!
//! 1. session present ([`require_session`]), before anything else,
//! 2. payload matches the operation's schema ([`validated`]),
//! 3. the target exists (update/delete),
//! 4. the caller owns it or is an admin ([`ensure_owner_or_admin`]),
//! 5. uniqueness (create post).
//!
//! Failures are values of [`ActionError`] and reach the client as
//! `{"success": false, "error": "..."}` through [`ActionReply`].

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Viewer},
    credentials::CredentialError,
    repository::RepositoryError,
    validation::Validate,
};

/// Action
///
/// The guarded operations, used for log fields and the generic failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Login,
    CreatePost,
    UpdatePost,
    DeletePost,
    CreateComment,
    DeleteComment,
    ToggleLike,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
            Action::CreatePost => "create_post",
            Action::UpdatePost => "update_post",
            Action::DeletePost => "delete_post",
            Action::CreateComment => "create_comment",
            Action::DeleteComment => "delete_comment",
            Action::ToggleLike => "toggle_like",
        }
    }

    /// What the user sees when infrastructure fails underneath this action.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Action::Register => "An error occurred during registration",
            Action::Login => "An error occurred during login",
            Action::CreatePost => "An error occurred while creating the post",
            Action::UpdatePost => "An error occurred while updating the post",
            Action::DeletePost => "An error occurred while deleting the post",
            Action::CreateComment => "An error occurred while adding the comment",
            Action::DeleteComment => "An error occurred while deleting the comment",
            Action::ToggleLike => "An error occurred while toggling the like",
        }
    }
}

/// The underlying cause of an `Unexpected` failure. Logged, never shown.
#[derive(Debug, Error)]
pub enum Infrastructure {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("session token could not be issued: {0}")]
    Session(String),
    #[error("background task failed: {0}")]
    Task(String),
}

/// ActionError
///
/// The failure taxonomy of guarded operations.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Unexpected {
        message: &'static str,
        #[source]
        source: Infrastructure,
    },
}

impl ActionError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ActionError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ActionError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ActionError::Conflict(message.into())
    }

    /// unexpected
    ///
    /// Wraps an infrastructure failure, logging the full cause. The returned error
    /// only carries the action's generic message.
    pub fn unexpected(action: Action, source: impl Into<Infrastructure>) -> Self {
        let source = source.into();
        tracing::error!(action = action.as_str(), error = ?source, "guarded action failed");
        ActionError::Unexpected {
            message: action.failure_message(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Unauthorized | ActionError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ActionError::Forbidden(_) => StatusCode::FORBIDDEN,
            ActionError::Validation(_) => StatusCode::BAD_REQUEST,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::Conflict(_) => StatusCode::CONFLICT,
            ActionError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ActionFailure
///
/// Wire shape of every failed action.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionFailure {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize)]
struct ActionSuccess<'a, T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: &'a T,
}

/// ActionReply
///
/// The discriminated result returned by every action endpoint:
/// `{"success": true, ...data}` or `{"success": false, "error": message}`.
pub struct ActionReply<T>(pub Result<T, ActionError>);

impl<T> From<Result<T, ActionError>> for ActionReply<T> {
    fn from(result: Result<T, ActionError>) -> Self {
        ActionReply(result)
    }
}

impl<T: Serialize> ActionReply<T> {
    /// The JSON body, independent of the HTTP status.
    pub fn body(&self) -> serde_json::Value {
        let value = match &self.0 {
            Ok(data) => serde_json::to_value(ActionSuccess {
                success: true,
                data,
            }),
            Err(e) => serde_json::to_value(ActionFailure {
                success: false,
                error: e.to_string(),
            }),
        };
        value.unwrap_or_else(|e| {
            tracing::error!(error = %e, "action reply serialization failed");
            serde_json::json!({ "success": false, "error": "Internal error" })
        })
    }
}

impl<T: Serialize> IntoResponse for ActionReply<T> {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        };
        (status, Json(self.body())).into_response()
    }
}

// --- Guard steps ---

/// Step 1. Unconditional, and always the first check.
pub fn require_session(viewer: &Viewer) -> Result<&AuthUser, ActionError> {
    viewer.user().ok_or(ActionError::Unauthorized)
}

/// Step 2. Unreadable JSON and schema violations are both validation errors; the
/// schema reports the first violated field's message.
pub fn validated<T: Validate>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ActionError> {
    let Json(input) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "unreadable action payload");
        ActionError::Validation("Invalid request body".to_string())
    })?;
    input.validate().map_err(ActionError::Validation)?;
    Ok(input)
}

/// OwnershipFact
///
/// `(resource_id, owner_id)` read from the store immediately before a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipFact {
    pub resource_id: Uuid,
    pub owner_id: Uuid,
}

/// Step 4. The caller must own the resource or be an admin.
pub fn ensure_owner_or_admin(
    caller: &AuthUser,
    fact: OwnershipFact,
    denied: &str,
) -> Result<(), ActionError> {
    if caller.id == fact.owner_id || caller.is_admin() {
        return Ok(());
    }
    tracing::info!(
        user_id = %caller.id,
        resource_id = %fact.resource_id,
        "ownership check denied mutation"
    );
    Err(ActionError::forbidden(denied))
}

/// parse_id
///
/// Identifiers arrive as strings so that the session check can run first; one
/// that is not a UUID cannot resolve to a record.
pub fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, ActionError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ActionError::not_found(not_found))
}
