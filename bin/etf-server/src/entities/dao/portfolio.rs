use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::EtfRecord;

/// How often a portfolio entry is invested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvestmentCycle {
    Daily,
    /// `day` is the weekday, 0 = Monday.
    Weekly,
    /// `day` is the day of month, 1-31.
    #[default]
    Monthly,
}

/// A row in the `portfolios` table.
#[derive(Debug, Clone)]
pub struct PortfolioRecord {
    pub id: i64,
    pub user_id: i64,
    pub etf_id: i64,
    pub monthly_investment: f64,
    pub cycle: InvestmentCycle,
    pub day: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A portfolio row joined with its ETF.
#[derive(Debug, Clone)]
pub struct PortfolioEntry {
    pub portfolio: PortfolioRecord,
    pub etf: EtfRecord,
}

/// Insert payload for [`PortfolioRecord`].
#[derive(Debug, Clone)]
pub struct NewPortfolio {
    pub user_id: i64,
    pub etf_id: i64,
    pub monthly_investment: f64,
    pub cycle: InvestmentCycle,
    pub day: Option<i64>,
}
