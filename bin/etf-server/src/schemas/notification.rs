use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::{NotificationRecord, SettingsRecord};
use crate::schemas::etf::validate_channels;

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct NotificationListQuery {
    #[validate(range(min = 0))]
    pub skip: Option<i64>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct NotificationCountQuery {
    /// Defaults to `true`.
    pub unread_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_read: bool,
    pub sent_via: Option<String>,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl NotificationRecord {
    pub fn to_response(&self) -> NotificationResponse {
        NotificationResponse {
            id: self.id,
            user_id: self.user_id,
            title: self.title.clone(),
            content: self.content.clone(),
            kind: self.kind.clone(),
            is_read: self.is_read,
            sent_via: self.sent_via.clone(),
            created_at: self.created_at.to_rfc3339(),
            read_at: self.read_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadAllResponse {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationSettingsResponse {
    pub notification_enabled: bool,
    pub notification_channels: String,
}

impl SettingsRecord {
    pub fn to_notification_settings(&self) -> NotificationSettingsResponse {
        NotificationSettingsResponse {
            notification_enabled: self.notification_enabled,
            notification_channels: self.notification_channels.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct NotificationSettingsUpdate {
    pub notification_enabled: Option<bool>,
    #[validate(custom(function = "validate_channels"))]
    pub notification_channels: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestNotificationResponse {
    pub message: String,
    pub notification_id: i64,
}
