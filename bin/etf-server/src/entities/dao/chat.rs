use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single message row in the `chat_messages` table.
#[derive(Debug, Clone)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub user_id: i64,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
