use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    /// Base URL of the identity provider (no trailing slash).
    pub identity_base_url: String,
    /// Service-role key. Used only for code generation and pre-session
    /// profile writes; never reaches a user-facing code path.
    pub identity_service_key: String,
    /// Publishable key for the user-scoped session client.
    pub identity_publishable_key: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub search_api_url: String,
    pub search_api_key: String,
    /// When set, takes precedence over forwarded headers in origin derivation.
    pub public_base_url: Option<String>,
    pub session_cookie_secure: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            identity_base_url: require_env("IDENTITY_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())?,
            identity_service_key: require_env("IDENTITY_SERVICE_KEY")?,
            identity_publishable_key: require_env("IDENTITY_PUBLISHABLE_KEY")?,
            email_api_url: require_env("EMAIL_API_URL")?,
            email_api_key: require_env("EMAIL_API_KEY")?,
            email_from: require_env("EMAIL_FROM")?,
            search_api_url: require_env("SEARCH_API_URL")?,
            search_api_key: require_env("SEARCH_API_KEY")?,
            public_base_url: std::env::var("PUBLIC_BASE_URL").ok(),
            session_cookie_secure: std::env::var("SESSION_COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
