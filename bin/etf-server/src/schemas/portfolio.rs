use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::entities::{InvestmentCycle, PortfolioEntry, PortfolioRecord};
use crate::schemas::etf::{EtfResponse, SettingsResponse};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct CreatePortfolioRequest {
    pub etf_id: i64,
    #[validate(range(exclusive_min = 0.0))]
    pub monthly_investment: f64,
    #[serde(default)]
    pub cycle: InvestmentCycle,
    /// Weekday (0 = Monday) for weekly plans, day of month for monthly ones.
    pub day: Option<i64>,
}

fn validate_schedule(req: &CreatePortfolioRequest) -> Result<(), ValidationError> {
    let valid = match (req.cycle, req.day) {
        (InvestmentCycle::Daily, _) | (_, None) => true,
        (InvestmentCycle::Weekly, Some(day)) => (0..=6).contains(&day),
        (InvestmentCycle::Monthly, Some(day)) => (1..=31).contains(&day),
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("day_out_of_range"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct UpdatePortfolioQuery {
    #[validate(range(exclusive_min = 0.0))]
    pub monthly_investment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioResponse {
    pub id: i64,
    pub user_id: i64,
    pub etf_id: i64,
    pub monthly_investment: f64,
    pub cycle: InvestmentCycle,
    pub day: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    /// Present in listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etf: Option<EtfResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioOverview {
    pub portfolios: Vec<PortfolioResponse>,
    pub settings: Option<SettingsResponse>,
}

impl PortfolioRecord {
    pub fn to_response(&self) -> PortfolioResponse {
        PortfolioResponse {
            id: self.id,
            user_id: self.user_id,
            etf_id: self.etf_id,
            monthly_investment: self.monthly_investment,
            cycle: self.cycle,
            day: self.day,
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
            etf: None,
        }
    }
}

impl PortfolioEntry {
    pub fn to_response(&self) -> PortfolioResponse {
        PortfolioResponse {
            etf: Some(self.etf.to_response()),
            ..self.portfolio.to_response()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(cycle: InvestmentCycle, day: Option<i64>, amount: f64) -> CreatePortfolioRequest {
        CreatePortfolioRequest {
            etf_id: 1,
            monthly_investment: amount,
            cycle,
            day,
        }
    }

    #[test]
    fn schedule_days_are_checked_per_cycle() {
        assert!(req(InvestmentCycle::Weekly, Some(0), 1.0).validate().is_ok());
        assert!(req(InvestmentCycle::Weekly, Some(7), 1.0).validate().is_err());
        assert!(req(InvestmentCycle::Monthly, Some(31), 1.0).validate().is_ok());
        assert!(req(InvestmentCycle::Monthly, Some(0), 1.0).validate().is_err());
        assert!(req(InvestmentCycle::Daily, Some(99), 1.0).validate().is_ok());
        assert!(req(InvestmentCycle::Monthly, None, 1.0).validate().is_ok());
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(req(InvestmentCycle::Monthly, None, 0.0).validate().is_err());
        assert!(req(InvestmentCycle::Monthly, None, -5.0).validate().is_err());
    }

    #[test]
    fn cycle_defaults_to_monthly() {
        let parsed: CreatePortfolioRequest =
            serde_json::from_str(r#"{"etf_id": 1, "monthly_investment": 10}"#).unwrap();
        assert_eq!(parsed.cycle, InvestmentCycle::Monthly);
        assert_eq!(parsed.day, None);
    }
}
