use std::env;

/// AppConfig
///
/// Holds the gateway's entire configuration state. Loaded once at startup and never
/// mutated afterwards, so every request sees the same values. It is pulled into
/// handlers and extractors through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the log format and the dev auth bypass.
    pub env: Env,
    // Secret used to sign and verify employee session tokens (HS256).
    pub jwt_secret: String,
    // Lifetime of an issued session token, in seconds.
    pub jwt_ttl_secs: u64,
    // Postgres connection string. Absent in local runs without a database.
    pub db_url: Option<String>,
    // TCP port the HTTP server listens on.
    pub port: u16,
    // Upper bound for a JSON request body, in bytes.
    pub body_limit_bytes: usize,
    // Buffer size of the notification broadcast channel.
    pub event_capacity: usize,
}

/// Env
///
/// Runtime context: `Local` enables developer conveniences (pretty logs, header
/// bypass, in-memory directory), `Production` demands every secret explicitly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const LOCAL_JWT_SECRET: &str = "storefront-local-development-secret";
pub const DEFAULT_JWT_TTL_SECS: u64 = 8 * 60 * 60;
pub const MAX_JWT_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_ttl_secs: DEFAULT_JWT_TTL_SECS,
            db_url: None,
            port: DEFAULT_PORT,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and applies the
    /// **fail-fast** rule for production secrets.
    ///
    /// # Panics
    /// Panics if `JWT_SECRET` or `DATABASE_URL` is missing while `APP_ENV=production`,
    /// so the server never starts with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, db_url) = match env {
            Env::Production => (
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
            ),
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("DATABASE_URL").ok(),
            ),
        };

        Self {
            env,
            jwt_secret,
            jwt_ttl_secs: jwt_ttl_or_default(parse_or("JWT_TTL_SECS", DEFAULT_JWT_TTL_SECS)),
            db_url,
            port: parse_or("PORT", DEFAULT_PORT),
            body_limit_bytes: parse_or("JSON_BODY_LIMIT", DEFAULT_BODY_LIMIT),
            event_capacity: parse_or("EVENT_CHANNEL_CAPACITY", DEFAULT_EVENT_CAPACITY).max(1),
        }
    }
}

/// Session lifetimes must be positive and at most `MAX_JWT_TTL_SECS`.
fn jwt_ttl_or_default(ttl: u64) -> u64 {
    if (1..=MAX_JWT_TTL_SECS).contains(&ttl) {
        ttl
    } else {
        tracing::warn!(
            variable = "JWT_TTL_SECS",
            value = ttl,
            max = MAX_JWT_TTL_SECS,
            "session lifetime out of range; using the default"
        );
        DEFAULT_JWT_TTL_SECS
    }
}

/// Numeric variables fall back to their default when unset or unparsable.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = key, value = %raw, "ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}
