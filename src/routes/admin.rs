use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// `/admin` is admin-only: the gate sends everyone without the ADMIN role to `/`,
/// and the handler repeats the check.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Site stats, newest users, posts and comments.
        .route("/admin", get(handlers::admin))
}
