use std::env;

/// Default lifetime of a session token: 30 days.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

const LOCAL_SESSION_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's configuration. Immutable once loaded and pulled into
/// handlers and extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. Locally it may be absent, in which case the
    // in-memory store is used.
    pub db_url: Option<String>,
    // Runtime environment marker. Controls the dev bypass and log format.
    pub env: Env,
    // HMAC secret used to sign and verify session tokens.
    pub session_secret: String,
    // Lifetime of an issued session token, in seconds. Refreshed on every request.
    pub session_ttl_secs: u64,
    // Whether the session cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Whether embedded migrations run at startup.
    pub run_migrations: bool,
    // Unsigned `x-user-id` sign-in for local development. Only ever set by an
    // explicit `AUTH_DEV_BYPASS` outside production.
    pub dev_bypass: bool,
}

/// Env
///
/// Runtime context: local development utilities versus hardened production settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test setup.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cookie_secure: false,
            bind_addr: "127.0.0.1:3000".to_string(),
            run_migrations: false,
            dev_bypass: false,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics when a variable required in production (`DATABASE_URL`,
    /// `SESSION_SECRET`) is missing, so the service never starts half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let session_ttl_secs = env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let run_migrations = env::var("RUN_MIGRATIONS").ok().and_then(|v| parse_bool(&v));

        let dev_bypass = env::var("AUTH_DEV_BYPASS")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                session_secret: env::var("SESSION_SECRET")
                    .unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string()),
                session_ttl_secs,
                cookie_secure: false,
                bind_addr,
                run_migrations: run_migrations.unwrap_or(true),
                dev_bypass,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                session_secret: env::var("SESSION_SECRET")
                    .expect("FATAL: SESSION_SECRET must be set in production."),
                session_ttl_secs,
                cookie_secure: true,
                bind_addr,
                run_migrations: run_migrations.unwrap_or(false),
                dev_bypass: false,
            },
        }
    }

    /// True when sessions are signed with the built-in development secret.
    pub fn uses_development_secret(&self) -> bool {
        self.session_secret == LOCAL_SESSION_SECRET
    }
}
