use crate::entities::{dao::EtfRecord, fmt_ts, parse_ts, SqliteStore};
use chrono::Utc;
use std::future::Future;

/// Catalogue inserted at startup and by `POST /init-etfs`: (symbol, name, description).
pub const INITIAL_ETFS: &[(&str, &str, &str)] = &[
    ("SPY", "미국 S&P500", "미국 대형주 지수 추종 ETF"),
    ("QQQ", "미국 나스닥", "미국 기술주 지수 추종 ETF"),
    ("EWY", "한국", "한국 주식 시장 ETF"),
    ("EWJ", "일본", "일본 주식 시장 ETF"),
    ("MCHI", "중국", "중국 주식 시장 ETF"),
    ("VGK", "유럽", "유럽 주식 시장 ETF"),
];

pub trait EtfStore: Send + Sync + 'static {
    fn list_etfs(&self) -> impl Future<Output = Result<Vec<EtfRecord>, sqlx::Error>> + Send;
    fn get_etf(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<EtfRecord>, sqlx::Error>> + Send;
    fn get_etf_by_symbol(
        &self,
        symbol: &str,
    ) -> impl Future<Output = Result<Option<EtfRecord>, sqlx::Error>> + Send;
    /// Insert the missing members of [`INITIAL_ETFS`]; returns how many were added.
    fn seed_etfs(&self) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

type EtfRow = (i64, String, String, Option<String>, String);

fn from_row((id, symbol, name, description, created_at): EtfRow) -> EtfRecord {
    EtfRecord {
        id,
        symbol,
        name,
        description,
        created_at: parse_ts(&created_at, "etfs.created_at"),
    }
}

impl EtfStore for SqliteStore {
    async fn list_etfs(&self) -> Result<Vec<EtfRecord>, sqlx::Error> {
        let rows: Vec<EtfRow> = sqlx::query_as(
            "SELECT id, symbol, name, description, created_at FROM etfs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get_etf(&self, id: i64) -> Result<Option<EtfRecord>, sqlx::Error> {
        let row: Option<EtfRow> = sqlx::query_as(
            "SELECT id, symbol, name, description, created_at FROM etfs WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn get_etf_by_symbol(&self, symbol: &str) -> Result<Option<EtfRecord>, sqlx::Error> {
        let row: Option<EtfRow> = sqlx::query_as(
            "SELECT id, symbol, name, description, created_at FROM etfs WHERE symbol = ?1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn seed_etfs(&self) -> Result<u64, sqlx::Error> {
        let now = fmt_ts(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for (symbol, name, description) in INITIAL_ETFS {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO etfs (symbol, name, description, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(symbol)
            .bind(name)
            .bind(description)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}
