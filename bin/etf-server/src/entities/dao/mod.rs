pub mod chat;
pub mod etf;
pub mod notification;
pub mod portfolio;
pub mod settings;
pub mod user;

pub use chat::{ChatMessageRecord, ChatRole};
pub use etf::EtfRecord;
pub use notification::{NewNotification, NotificationChannel, NotificationRecord, NotificationType};
pub use portfolio::{InvestmentCycle, NewPortfolio, PortfolioEntry, PortfolioRecord};
pub use settings::{NewSettings, SettingsPatch, SettingsRecord};
pub use user::{NewUser, UserRecord};
