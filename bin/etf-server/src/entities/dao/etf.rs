use chrono::{DateTime, Utc};

/// A row in the `etfs` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EtfRecord {
    pub id: i64,
    /// Ticker, e.g. `"SPY"`.
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
