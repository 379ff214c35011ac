//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Secret used when `JWT_SECRET_KEY` is not set. Only suitable for local runs.
pub const DEV_JWT_SECRET: &str = "etf-backend-dev-secret";

/// Runtime configuration for etf-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://app.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rolling log files. Stdout only when unset.
    pub log_dir: Option<String>,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    pub jwt_secret: String,

    /// Access-token lifetime in minutes.
    pub access_token_expire_minutes: i64,

    /// Base URL of the external AI analysis service.
    pub ai_service_url: String,

    pub ai_max_retries: u32,

    /// Pause between AI service retries.
    pub ai_retry_delay: Duration,

    /// Connect and per-read limit for AI calls; also the total limit of `/analyze`.
    pub ai_request_timeout: Duration,

    /// Keyword score at or above which an analysis without history triggers a notification.
    pub ai_analysis_threshold: f64,

    /// Number of past chat messages replayed into each prompt.
    pub chat_history_limit: i64,

    pub scheduler_enabled: bool,

    /// Seconds between investment-day checks.
    pub scheduler_interval: Duration,

    /// Hours east of UTC used for "today" (default: 9, KST).
    pub timezone_offset_hours: i32,

    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,
    pub sendgrid_from_name: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("ETF_BIND", "0.0.0.0:8000"),
            database_url: env_or("ETF_DATABASE_URL", "sqlite://app.db"),
            log_level: env_or("ETF_LOG", "info"),
            log_json: parse_bool("ETF_LOG_JSON", false),
            log_dir: env_opt("ETF_LOG_DIR"),
            cors_allowed_origins: env_opt("ETF_CORS_ORIGINS"),
            enable_swagger: parse_bool("ETF_ENABLE_SWAGGER", true),
            jwt_secret: env_or("JWT_SECRET_KEY", DEV_JWT_SECRET),
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 30),
            ai_service_url: env_or("ETF_AI_SERVICE_URL", "http://localhost:8001"),
            ai_max_retries: parse_env("AI_SERVICE_MAX_RETRIES", 3),
            ai_retry_delay: Duration::from_secs(parse_env("AI_SERVICE_RETRY_DELAY", 5)),
            ai_request_timeout: Duration::from_secs(parse_env("AI_SERVICE_TIMEOUT", 60)),
            ai_analysis_threshold: parse_env("AI_ANALYSIS_THRESHOLD", 0.7),
            chat_history_limit: parse_env("CHAT_HISTORY_LIMIT", 20),
            scheduler_enabled: parse_bool("SCHEDULER_ENABLED", true),
            scheduler_interval: Duration::from_secs(parse_env("SCHEDULER_INTERVAL", 3600)),
            timezone_offset_hours: parse_env("TIMEZONE_OFFSET", 9),
            sendgrid_api_key: env_opt("SENDGRID_API_KEY"),
            sendgrid_from_email: env_or("SENDGRID_FROM_EMAIL", "noreply@etfapp.com"),
            sendgrid_from_name: env_or("SENDGRID_FROM_NAME", "ETF 투자 관리팀"),
        }
    }

    /// Configuration for tests: in-memory database, no scheduler, no e-mail.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            enable_swagger: false,
            jwt_secret: "test-secret".to_owned(),
            ai_retry_delay: Duration::from_millis(0),
            ai_max_retries: 1,
            scheduler_enabled: false,
            sendgrid_api_key: None,
            ..Self::from_defaults()
        }
    }

    fn from_defaults() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_owned(),
            database_url: "sqlite://app.db".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
            jwt_secret: DEV_JWT_SECRET.to_owned(),
            access_token_expire_minutes: 30,
            ai_service_url: "http://localhost:8001".to_owned(),
            ai_max_retries: 3,
            ai_retry_delay: Duration::from_secs(5),
            ai_request_timeout: Duration::from_secs(60),
            ai_analysis_threshold: 0.7,
            chat_history_limit: 20,
            scheduler_enabled: true,
            scheduler_interval: Duration::from_secs(3600),
            timezone_offset_hours: 9,
            sendgrid_api_key: None,
            sendgrid_from_email: "noreply@etfapp.com".to_owned(),
            sendgrid_from_name: "ETF 투자 관리팀".to_owned(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
