use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Reachable without a session. `/login` and `/register` are auth-only: the gate
/// sends signed-in callers to the dashboard before these handlers run.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Latest published posts.
        .route("/", get(handlers::home))
        // GET /post/{slug}
        // Post detail with threaded comments. Drafts only for their author.
        .route("/post/{slug}", get(handlers::post_detail))
        // GET|POST /login
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET|POST /register
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        // POST /logout
        // Expires the session cookie; harmless without a session.
        .route("/logout", post(handlers::logout))
}
