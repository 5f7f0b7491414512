//! Route classification and the access decision engine.
//!
//! Every inbound request is classified against three ordered lists of route
//! patterns (protected, auth-only, admin-only). The classification and the
//! caller's session are then combined into a single [`AccessDecision`].
//! Both steps are pure: nothing here holds state between requests.

use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

use crate::{auth::AuthUser, models::Role};

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const CALLBACK_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const CALLBACK_PARAM: &str = "callbackUrl";

// --- Patterns ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("route pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),
    #[error("route pattern `{0}` has a parameter without a name")]
    EmptyParameter(String),
    #[error("route pattern `{0}` has a catch-all parameter that is not the last segment")]
    CatchAllNotLast(String),
}

/// Segment
///
/// One compiled piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches exactly this text.
    Literal(String),
    /// `:name`, exactly one non-empty path segment.
    Param(String),
    /// `:name*`, one or more trailing segments.
    CatchAll(String),
}

/// RoutePattern
///
/// A path template compiled once at startup. Matching is anchored and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> Vec<&str> {
    match path.strip_prefix('/') {
        Some("") | None => Vec::new(),
        Some(rest) => rest.split('/').collect(),
    }
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }

        let parts = split_path(raw);
        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix(':') {
                Some(name) => match name.strip_suffix('*') {
                    Some(name) => {
                        if index + 1 != parts.len() {
                            return Err(PatternError::CatchAllNotLast(raw.to_string()));
                        }
                        Segment::CatchAll(name.to_string())
                    }
                    None => Segment::Param(name.to_string()),
                },
                None => Segment::Literal(part.to_string()),
            };
            if let Segment::Param(name) | Segment::CatchAll(name) = &segment {
                if name.is_empty() {
                    return Err(PatternError::EmptyParameter(raw.to_string()));
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        let parts = split_path(path);

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(_) => return parts.len() > index,
                Segment::Param(_) => match parts.get(index) {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(text) => match parts.get(index) {
                    Some(part) if *part == text => {}
                    _ => return false,
                },
            }
        }

        parts.len() == self.segments.len()
    }
}

impl FromStr for RoutePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// --- Classification ---

/// RouteClass
///
/// Independent flags: a path may be protected and admin-only at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteClass {
    pub protected: bool,
    pub auth_only: bool,
    pub admin_only: bool,
}

/// RouteTable
///
/// The three ordered lists of compiled patterns. Built once at process start and
/// shared read-only by the access gate.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    protected: Vec<RoutePattern>,
    auth_only: Vec<RoutePattern>,
    admin_only: Vec<RoutePattern>,
}

fn compile(patterns: &[&str]) -> Result<Vec<RoutePattern>, PatternError> {
    patterns.iter().map(|raw| RoutePattern::parse(raw)).collect()
}

impl RouteTable {
    pub fn new(
        protected: &[&str],
        auth_only: &[&str],
        admin_only: &[&str],
    ) -> Result<Self, PatternError> {
        Ok(Self {
            protected: compile(protected)?,
            auth_only: compile(auth_only)?,
            admin_only: compile(admin_only)?,
        })
    }

    /// The blog's route lists.
    pub fn blog() -> Result<Self, PatternError> {
        Self::new(
            &[
                "/dashboard",
                "/dashboard/:path*",
                "/create-post",
                "/edit-post/:path*",
                "/profile",
                "/settings",
            ],
            &["/login", "/register"],
            &["/admin", "/admin/:path*"],
        )
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let any = |list: &[RoutePattern]| list.iter().any(|pattern| pattern.matches(path));
        RouteClass {
            protected: any(&self.protected),
            auth_only: any(&self.auth_only),
            admin_only: any(&self.admin_only),
        }
    }
}

// --- Decisions ---

/// AccessDecision
///
/// The outcome for one request. Computed fresh every time, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Carries the original path and query, unencoded.
    RedirectLogin { callback: String },
    RedirectHome,
    RedirectDashboard,
}

impl AccessDecision {
    /// The `Location` to send the caller to, or `None` for [`AccessDecision::Allow`].
    pub fn location(&self) -> Option<String> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::RedirectLogin { callback } => Some(format!(
                "{LOGIN_PATH}?{CALLBACK_PARAM}={}",
                encode_callback(callback)
            )),
            AccessDecision::RedirectHome => Some(HOME_PATH.to_string()),
            AccessDecision::RedirectDashboard => Some(DASHBOARD_PATH.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::RedirectLogin { .. } => "redirect_login",
            AccessDecision::RedirectHome => "redirect_home",
            AccessDecision::RedirectDashboard => "redirect_dashboard",
        }
    }
}

pub fn encode_callback(callback: &str) -> String {
    utf8_percent_encode(callback, CALLBACK_ENCODE_SET).to_string()
}

/// decide
///
/// Evaluated in fixed order, first match wins:
/// 1. protected and anonymous: login, with the original destination as callback.
/// 2. auth-only and signed in: dashboard.
/// 3. admin-only and not an admin (anonymous included): home.
/// 4. allow.
///
/// An admin-only route that is not also protected sends anonymous callers home,
/// not to login.
pub fn decide(class: RouteClass, role: Option<Role>, path_and_query: &str) -> AccessDecision {
    let logged_in = role.is_some();

    if class.protected && !logged_in {
        return AccessDecision::RedirectLogin {
            callback: path_and_query.to_string(),
        };
    }

    if class.auth_only && logged_in {
        return AccessDecision::RedirectDashboard;
    }

    if class.admin_only && role != Some(Role::Admin) {
        return AccessDecision::RedirectHome;
    }

    AccessDecision::Allow
}

/// evaluate
///
/// Classifies `path` and decides for the given session in one step.
pub fn evaluate(
    table: &RouteTable,
    session: Option<&AuthUser>,
    path: &str,
    path_and_query: &str,
) -> AccessDecision {
    decide(
        table.classify(path),
        session.map(|user| user.role),
        path_and_query,
    )
}

/// is_local_redirect
///
/// Accepts only same-origin absolute paths, so a callback can never send the user
/// to another host.
pub fn is_local_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}
