use crate::entities::{
    dao::{EtfRecord, InvestmentCycle, NewPortfolio, PortfolioEntry, PortfolioRecord},
    fmt_ts, parse_ts, SqliteStore,
};
use chrono::Utc;
use std::future::Future;

pub trait PortfolioStore: Send + Sync + 'static {
    /// Entries of `user_id` joined with their ETF, oldest first.
    fn list_portfolios(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<PortfolioEntry>, sqlx::Error>> + Send;
    fn get_portfolio(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<PortfolioRecord>, sqlx::Error>> + Send;
    fn create_portfolio(
        &self,
        portfolio: NewPortfolio,
    ) -> impl Future<Output = Result<PortfolioRecord, sqlx::Error>> + Send;
    /// Returns `false` when no row matched.
    fn update_portfolio_amount(
        &self,
        id: i64,
        monthly_investment: f64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn delete_portfolio(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn delete_user_portfolios(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
    /// Atomically swap the user's portfolio for one monthly entry per ETF id.
    fn replace_portfolios(
        &self,
        user_id: i64,
        etf_ids: Vec<i64>,
        monthly_investment: f64,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type PortfolioRow = (i64, i64, i64, f64, String, Option<i64>, String, String);

type EntryRow = (
    i64,
    i64,
    i64,
    f64,
    String,
    Option<i64>,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

const PORTFOLIO_COLUMNS: &str =
    "id, user_id, etf_id, monthly_investment, cycle, day, created_at, updated_at";

fn parse_cycle(raw: &str) -> InvestmentCycle {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(raw = %raw, "unknown investment cycle; treating as monthly");
        InvestmentCycle::Monthly
    })
}

fn from_row(row: PortfolioRow) -> PortfolioRecord {
    let (id, user_id, etf_id, monthly_investment, cycle, day, created_at, updated_at) = row;
    PortfolioRecord {
        id,
        user_id,
        etf_id,
        monthly_investment,
        cycle: parse_cycle(&cycle),
        day,
        created_at: parse_ts(&created_at, "portfolios.created_at"),
        updated_at: parse_ts(&updated_at, "portfolios.updated_at"),
    }
}

fn entry_from_row(row: EntryRow) -> PortfolioEntry {
    let (
        id,
        user_id,
        etf_id,
        monthly_investment,
        cycle,
        day,
        created_at,
        updated_at,
        symbol,
        name,
        description,
        etf_created_at,
    ) = row;
    PortfolioEntry {
        portfolio: from_row((
            id,
            user_id,
            etf_id,
            monthly_investment,
            cycle,
            day,
            created_at,
            updated_at,
        )),
        etf: EtfRecord {
            id: etf_id,
            symbol,
            name,
            description,
            created_at: parse_ts(&etf_created_at, "etfs.created_at"),
        },
    }
}

impl PortfolioStore for SqliteStore {
    async fn list_portfolios(&self, user_id: i64) -> Result<Vec<PortfolioEntry>, sqlx::Error> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT p.id, p.user_id, p.etf_id, p.monthly_investment, p.cycle, p.day, \
                    p.created_at, p.updated_at, e.symbol, e.name, e.description, e.created_at \
             FROM portfolios p JOIN etfs e ON e.id = p.etf_id \
             WHERE p.user_id = ?1 ORDER BY p.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn get_portfolio(&self, id: i64) -> Result<Option<PortfolioRecord>, sqlx::Error> {
        let row: Option<PortfolioRow> =
            sqlx::query_as(&format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(from_row))
    }

    async fn create_portfolio(&self, p: NewPortfolio) -> Result<PortfolioRecord, sqlx::Error> {
        let now = fmt_ts(Utc::now());
        let row: PortfolioRow = sqlx::query_as(&format!(
            "INSERT INTO portfolios \
             (user_id, etf_id, monthly_investment, cycle, day, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) RETURNING {PORTFOLIO_COLUMNS}"
        ))
        .bind(p.user_id)
        .bind(p.etf_id)
        .bind(p.monthly_investment)
        .bind(p.cycle.as_ref())
        .bind(p.day)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }

    async fn update_portfolio_amount(
        &self,
        id: i64,
        monthly_investment: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE portfolios SET monthly_investment = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(monthly_investment)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_portfolio(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_portfolios(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM portfolios WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_portfolios(
        &self,
        user_id: i64,
        etf_ids: Vec<i64>,
        monthly_investment: f64,
    ) -> Result<(), sqlx::Error> {
        let now = fmt_ts(Utc::now());
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM portfolios WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for etf_id in etf_ids {
            sqlx::query(
                "INSERT INTO portfolios \
                 (user_id, etf_id, monthly_investment, cycle, day, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
            )
            .bind(user_id)
            .bind(etf_id)
            .bind(monthly_investment)
            .bind(InvestmentCycle::Monthly.as_ref())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::test_support::{memory_store, user};
    use crate::entities::EtfStore;

    #[tokio::test]
    async fn create_list_update_delete() {
        let store = memory_store().await;
        store.seed_etfs().await.unwrap();
        let alice = user(&store, "alice").await;
        let spy = store.get_etf_by_symbol("SPY").await.unwrap().unwrap();

        let created = store
            .create_portfolio(NewPortfolio {
                user_id: alice.id,
                etf_id: spy.id,
                monthly_investment: 100.0,
                cycle: InvestmentCycle::Weekly,
                day: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(created.cycle, InvestmentCycle::Weekly);

        let listed = store.list_portfolios(alice.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].etf.symbol, "SPY");
        assert_eq!(listed[0].portfolio.day, Some(2));

        assert!(store.update_portfolio_amount(created.id, 250.0).await.unwrap());
        let fetched = store.get_portfolio(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.monthly_investment, 250.0);

        assert!(store.delete_portfolio(created.id).await.unwrap());
        assert!(!store.delete_portfolio(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn replace_swaps_whole_portfolio() {
        let store = memory_store().await;
        store.seed_etfs().await.unwrap();
        let alice = user(&store, "alice").await;
        let etfs = store.list_etfs().await.unwrap();

        store
            .replace_portfolios(alice.id, vec![etfs[0].id, etfs[1].id], 50.0)
            .await
            .unwrap();
        store
            .replace_portfolios(alice.id, vec![etfs[2].id], 70.0)
            .await
            .unwrap();

        let listed = store.list_portfolios(alice.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].etf.id, etfs[2].id);
        assert_eq!(listed[0].portfolio.cycle, InvestmentCycle::Monthly);
        assert_eq!(listed[0].portfolio.monthly_investment, 70.0);
    }

    #[tokio::test]
    async fn delete_all_is_scoped_to_user() {
        let store = memory_store().await;
        store.seed_etfs().await.unwrap();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let etf = store.list_etfs().await.unwrap().remove(0);
        store.replace_portfolios(alice.id, vec![etf.id], 10.0).await.unwrap();
        store.replace_portfolios(bob.id, vec![etf.id], 10.0).await.unwrap();

        assert_eq!(store.delete_user_portfolios(alice.id).await.unwrap(), 1);
        assert_eq!(store.list_portfolios(bob.id).await.unwrap().len(), 1);
    }
}
