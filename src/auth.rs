use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use cookie::{Cookie, CookieJar, SameSite, time::Duration};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::{Role, User},
    repository::RepositoryState,
};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Claims
///
/// Payload of the signed session token. The role is informational only: the
/// resolver always re-reads the user's current role from the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session token expired")]
    Expired,
    #[error("invalid session token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// AuthUser
///
/// The resolved identity of a signed-in caller: user id, display name and role.
/// Produced per request by [`resolve_session`] and passed explicitly to the
/// access engine and the per-action guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}

/// Viewer
///
/// Extractor for the caller's session, which may be absent. It never rejects:
/// pages render for anonymous visitors and guarded actions report `Unauthorized`
/// themselves, after resolving the session and before touching the payload.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self(Some(user))
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved for this request by the access gate.
        if let Some(viewer) = parts.extensions.get::<Viewer>() {
            return Ok(viewer.clone());
        }
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        Ok(Viewer(resolve_session(&parts.headers, &repo, &config).await))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// issue_token
///
/// Signs a fresh session token for `user`, valid for the configured TTL.
pub fn issue_token(user: &AuthUser, config: &AppConfig) -> Result<String, SessionError> {
    let now = now_secs();
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        role: user.role,
        iat: now as usize,
        exp: (now + config.session_ttl_secs) as usize,
    };
    let key = EncodingKey::from_secret(config.session_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// decode_token
///
/// Verifies the signature and expiry of a session token.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, SessionError> {
    let key = DecodingKey::from_secret(config.session_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Invalid(e),
        })
}

// Every cookie on the request, across all `Cookie` headers.
fn request_cookies(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for raw in headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
    {
        for cookie in Cookie::split_parse(raw).filter_map(Result::ok) {
            jar.add_original(cookie.into_owned());
        }
    }
    jar
}

/// session_tokens
///
/// Candidate tokens in the order they are tried: the session cookie, then an
/// `Authorization: Bearer` header. A stale cookie does not hide a valid header.
pub fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let from_cookie = request_cookies(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    from_cookie.into_iter().chain(from_header).collect()
}

/// resolve_session
///
/// Produces the caller's identity from the request credentials, or `None`.
///
/// 1. Local bypass: only when `dev_bypass` is switched on outside production, an
///    `x-user-id` header naming an existing user signs the request in as that user.
/// 2. Token: the first of cookie and Bearer token whose signature and expiry check out.
/// 3. Store lookup: the user must still exist; name and role come from the record,
///    so permission changes apply on the very next request.
pub async fn resolve_session(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Option<AuthUser> {
    if config.dev_bypass && config.env == Env::Local {
        if let Some(user_id) = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            match repo.get_user(user_id).await {
                Ok(Some(user)) => return Some(user.into()),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "dev bypass lookup failed"),
            }
        }
    }

    let claims = session_tokens(headers)
        .iter()
        .find_map(|token| match decode_token(token, config) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        })?;

    match repo.get_user(claims.sub).await {
        Ok(Some(user)) => Some(user.into()),
        Ok(None) => {
            tracing::debug!(user_id = %claims.sub, "session for unknown user");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            None
        }
    }
}

// --- Cookies ---

fn cookie_value(value: &str, max_age: u64, config: &AppConfig) -> Option<HeaderValue> {
    let max_age = Duration::seconds(i64::try_from(max_age).unwrap_or(i64::MAX));
    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .secure(config.cookie_secure)
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// session_cookie
///
/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, config: &AppConfig) -> Option<HeaderValue> {
    cookie_value(token, config.session_ttl_secs, config)
}

/// clear_session_cookie
///
/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_session_cookie(config: &AppConfig) -> Option<HeaderValue> {
    cookie_value("", 0, config)
}

/// sets_session_cookie
///
/// True when a response already writes the session cookie (login, logout).
pub fn sets_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == SESSION_COOKIE)
}
