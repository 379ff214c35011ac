//! Persistence layer.
//!
//! Each aggregate gets its own store trait (`UserStore`, `EtfStore`, …) whose
//! methods return `impl Future` (stable since Rust 1.75), all implemented by
//! [`SqliteStore`]. Handlers only see the traits, so a different backend only
//! needs new impls.
//!
//! # Migrations
//!
//! `sqlx::migrate!("./migrations")` resolves the path at compile time relative
//! to `CARGO_MANIFEST_DIR`, so the schema is embedded into the binary.
//!
//! # Timestamps
//!
//! Stored as RFC 3339 TEXT with fixed microsecond precision and a `Z` suffix,
//! which keeps lexical and chronological order identical.

pub mod chat;
pub mod dao;
pub mod etf;
pub mod notification;
pub mod portfolio;
pub mod settings;
pub mod user;

pub use dao::{
    ChatMessageRecord, ChatRole, EtfRecord, InvestmentCycle, NewNotification, NewPortfolio,
    NewSettings, NewUser, NotificationChannel, NotificationRecord, NotificationType,
    PortfolioEntry, PortfolioRecord, SettingsPatch, SettingsRecord, UserRecord,
};

pub use chat::ChatStore;
pub use etf::EtfStore;
pub use notification::NotificationStore;
pub use portfolio::PortfolioStore;
pub use settings::SettingsStore;
pub use user::UserStore;

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Connection cap for file-backed databases.
const MAX_CONNECTIONS: u32 = 20;

/// SQLite-backed store for every aggregate.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://app.db"`
    /// or `"sqlite::memory:"` for tests. In-memory databases are private to a
    /// connection, so they get a single long-lived connection.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Round-trip a trivial query; used by the health check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Filesystem path behind a SQLite URL; `None` for in-memory databases.
pub fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Format a timestamp for storage.
pub(crate) fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, falling back to "now" on corrupt data.
pub(crate) fn parse_ts(raw: &str, field: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, field, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

pub(crate) fn parse_opt_ts(raw: Option<String>, field: &'static str) -> Option<DateTime<Utc>> {
    raw.map(|r| parse_ts(&r, field))
}
