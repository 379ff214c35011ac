use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

/// Kind of notification; stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    InvestmentReminder,
    AiAnalysis,
    PortfolioAnalysis,
    System,
}

impl NotificationType {
    /// Default title shown in the app.
    pub fn title(self) -> &'static str {
        match self {
            NotificationType::InvestmentReminder => "투자일 알림",
            NotificationType::AiAnalysis => "AI 투자 분석 결과",
            NotificationType::PortfolioAnalysis => "ETF 포트폴리오 투자 분석 알림",
            NotificationType::System => "시스템 알림",
        }
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationChannel {
    App,
    Email,
    Sms,
}

impl NotificationChannel {
    /// Parse a comma-separated channel list. Empty input means app-only.
    pub fn parse_list(raw: &str) -> Result<Vec<NotificationChannel>, strum::ParseError> {
        let channels = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if channels.is_empty() {
            return Ok(vec![NotificationChannel::App]);
        }
        Ok(channels)
    }

    /// Whether `channel` appears in the stored list. Unknown entries are ignored.
    pub fn is_enabled(raw: &str, channel: NotificationChannel) -> bool {
        raw.split(',')
            .filter_map(|s| s.trim().parse::<NotificationChannel>().ok())
            .any(|c| c == channel)
    }
}

/// A row in the `notifications` table.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    /// Raw `type` column; see [`NotificationType`].
    pub kind: String,
    pub is_read: bool,
    pub sent_via: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Insert payload for [`NotificationRecord`].
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub kind: NotificationType,
    pub sent_via: Option<NotificationChannel>,
}
