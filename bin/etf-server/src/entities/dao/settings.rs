use chrono::{DateTime, Utc};

/// A row in the `investment_settings` table.
#[derive(Debug, Clone)]
pub struct SettingsRecord {
    pub id: i64,
    pub user_id: i64,
    /// 0 (conservative) to 10 (aggressive).
    pub risk_level: i64,
    /// Key forwarded to the AI service on the user's behalf.
    pub api_key: Option<String>,
    pub model_type: String,
    pub monthly_investment: f64,
    pub persona: Option<String>,
    pub notification_enabled: bool,
    /// Comma-separated channel list, e.g. `"app,email"`.
    pub notification_channels: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`SettingsRecord`].
#[derive(Debug, Clone)]
pub struct NewSettings {
    pub risk_level: i64,
    pub api_key: Option<String>,
    pub model_type: String,
    pub monthly_investment: f64,
    pub persona: Option<String>,
    pub notification_enabled: bool,
    pub notification_channels: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub risk_level: Option<i64>,
    pub api_key: Option<String>,
    pub model_type: Option<String>,
    pub monthly_investment: Option<f64>,
    pub persona: Option<String>,
    pub notification_enabled: Option<bool>,
    pub notification_channels: Option<String>,
}
