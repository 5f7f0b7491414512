use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Pages here are protected routes: the gate redirects anonymous callers to
/// `/login` with a callback. Actions are not gated by path; each one answers
/// `Unauthorized` itself before reading its payload.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Pages ---
        .route("/dashboard", get(handlers::dashboard))
        .route("/create-post", get(handlers::create_post_page))
        // GET /edit-post/{id}
        // Author or admin only.
        .route("/edit-post/{id}", get(handlers::edit_post_page))
        // --- Posts ---
        .route("/actions/posts", post(handlers::create_post))
        .route(
            "/actions/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /actions/posts/{id}/like
        // Toggles the caller's like.
        .route("/actions/posts/{id}/like", post(handlers::toggle_like))
        // --- Comments ---
        .route("/actions/comments", post(handlers::create_comment))
        .route("/actions/comments/{id}", delete(handlers::delete_comment))
}
