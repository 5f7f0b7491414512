use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization core: route classification, access decisions, the action guard.
pub mod access;
pub mod auth;
pub mod guard;

// Operations and their collaborators.
pub mod actions;
pub mod config;
pub mod credentials;
pub mod handlers;
pub mod invalidation;
pub mod models;
pub mod repository;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use access::{AccessDecision, PatternError, RouteTable};
pub use auth::{AuthUser, Viewer};
pub use config::AppConfig;
pub use credentials::{Argon2Credentials, CredentialState};
pub use invalidation::{Invalidator, ViewTarget};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the action endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::logout,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::toggle_like, handlers::create_comment, handlers::delete_comment
    ),
    components(
        schemas(
            models::Role, models::RegisterInput, models::LoginInput, models::PostInput,
            models::CommentInput, actions::Message, actions::PostSaved,
            actions::CommentCreated, actions::LikeToggled, actions::LoggedIn,
            guard::ActionFailure,
        )
    ),
    tags(
        (name = "blog-portal", description = "Blog Portal actions")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The shared, cheaply cloneable container of every collaborator a request may
/// need. Nothing in here caches authorization: sessions and ownership are
/// resolved per request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence collaborator (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Password hashing and verification.
    pub credentials: CredentialState,
    /// Publisher for stale views after successful mutations.
    pub invalidator: Invalidator,
    /// Compiled route lists, built once at startup.
    pub routes: Arc<RouteTable>,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Assembles the state with the blog's route table, Argon2 credentials and a
    /// fresh invalidation channel. Fails if a route pattern is malformed.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, PatternError> {
        Ok(Self {
            repo,
            credentials: Arc::new(Argon2Credentials::new()),
            invalidator: Invalidator::new(),
            routes: Arc::new(RouteTable::blog()?),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CredentialState {
    fn from_ref(app_state: &AppState) -> CredentialState {
        app_state.credentials.clone()
    }
}

impl FromRef<AppState> for Invalidator {
    fn from_ref(app_state: &AppState) -> Invalidator {
        app_state.invalidator.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// access_gate
///
/// Runs for every inbound request, matched or not.
///
/// 1. Resolves the session once and stores it in the request extensions, where
///    the `Viewer` extractor picks it up.
/// 2. Classifies the path and applies the access decision; any redirect is a 307.
/// 3. On `Allow` with a session, re-issues the session cookie so the expiry
///    slides, unless the handler wrote the cookie itself (login, logout).
async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let session = auth::resolve_session(request.headers(), &state.repo, &state.config).await;

    let uri = request.uri();
    let path = uri.path().to_string();
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let decision = access::evaluate(&state.routes, session.as_ref(), &path, &path_and_query);
    if let Some(location) = decision.location() {
        tracing::info!(
            decision = decision.as_str(),
            path = %path,
            signed_in = session.is_some(),
            "access gate redirect"
        );
        return Redirect::temporary(&location).into_response();
    }

    request.extensions_mut().insert(Viewer(session.clone()));
    let mut response = next.run(request).await;

    if let Some(user) = session {
        if !auth::sets_session_cookie(response.headers()) {
            match auth::issue_token(&user, &state.config) {
                Ok(token) => {
                    if let Some(cookie) = auth::session_cookie(&token, &state.config) {
                        response.headers_mut().append(header::SET_COOKIE, cookie);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "session refresh failed"),
            }
        }
    }

    response
}

/// create_router
///
/// Assembles the routers, the access gate and the observability layers, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        // Registered before the gate so unmatched paths are gated too.
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
