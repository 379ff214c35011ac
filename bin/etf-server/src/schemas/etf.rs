use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::entities::{EtfRecord, NewSettings, NotificationChannel, SettingsPatch, SettingsRecord};
use crate::services::ai::DEFAULT_MODEL_TYPE;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EtfResponse {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl EtfRecord {
    pub fn to_response(&self) -> EtfResponse {
        EtfResponse {
            id: self.id,
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// Reject channel lists naming anything but `app`, `email` or `sms`.
pub fn validate_channels(raw: &str) -> Result<(), ValidationError> {
    NotificationChannel::parse_list(raw)
        .map(|_| ())
        .map_err(|_| ValidationError::new("notification_channels"))
}

/// Body of `POST` and `PUT /users/me/settings`. Absent fields keep their
/// defaults on create and their current value on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct SettingsRequest {
    /// 0 (conservative) to 10 (aggressive).
    #[validate(range(min = 0, max = 10))]
    pub risk_level: Option<i64>,
    pub api_key: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub model_type: Option<String>,
    #[validate(range(min = 0.0))]
    pub monthly_investment: Option<f64>,
    pub persona: Option<String>,
    pub notification_enabled: Option<bool>,
    #[validate(custom(function = "validate_channels"))]
    pub notification_channels: Option<String>,
    /// Replaces the portfolio when present; unknown symbols are skipped.
    pub etf_symbols: Option<Vec<String>>,
}

impl SettingsRequest {
    pub fn to_new(&self) -> NewSettings {
        NewSettings {
            risk_level: self.risk_level.unwrap_or(5),
            api_key: self.api_key.clone(),
            model_type: self
                .model_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_TYPE.to_owned()),
            monthly_investment: self.monthly_investment.unwrap_or(10.0),
            persona: self.persona.clone(),
            notification_enabled: self.notification_enabled.unwrap_or(true),
            notification_channels: self
                .notification_channels
                .clone()
                .unwrap_or_else(|| "app".to_owned()),
        }
    }

    pub fn to_patch(&self) -> SettingsPatch {
        SettingsPatch {
            risk_level: self.risk_level,
            api_key: self.api_key.clone(),
            model_type: self.model_type.clone(),
            monthly_investment: self.monthly_investment,
            persona: self.persona.clone(),
            notification_enabled: self.notification_enabled,
            notification_channels: self.notification_channels.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub id: i64,
    pub user_id: i64,
    pub risk_level: i64,
    pub api_key: Option<String>,
    pub model_type: String,
    pub monthly_investment: f64,
    pub persona: Option<String>,
    pub notification_enabled: bool,
    pub notification_channels: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SettingsRecord {
    pub fn to_response(&self) -> SettingsResponse {
        SettingsResponse {
            id: self.id,
            user_id: self.user_id,
            risk_level: self.risk_level,
            api_key: self.api_key.clone(),
            model_type: self.model_type.clone(),
            monthly_investment: self.monthly_investment,
            persona: self.persona.clone(),
            notification_enabled: self.notification_enabled,
            notification_channels: self.notification_channels.clone(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

/// Settings together with the ETFs currently held.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSettingsResponse {
    pub settings: Option<SettingsResponse>,
    pub etfs: Vec<EtfResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct EtfSymbolsRequest {
    pub etf_symbols: Vec<String>,
}
