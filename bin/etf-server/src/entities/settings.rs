use crate::entities::{
    dao::{NewSettings, SettingsPatch, SettingsRecord},
    fmt_ts, parse_ts, SqliteStore,
};
use chrono::Utc;
use std::future::Future;

pub trait SettingsStore: Send + Sync + 'static {
    fn get_settings(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<SettingsRecord>, sqlx::Error>> + Send;
    fn create_settings(
        &self,
        user_id: i64,
        settings: NewSettings,
    ) -> impl Future<Output = Result<SettingsRecord, sqlx::Error>> + Send;
    /// Apply `patch`; returns `None` when the user has no settings row.
    fn update_settings(
        &self,
        user_id: i64,
        patch: SettingsPatch,
    ) -> impl Future<Output = Result<Option<SettingsRecord>, sqlx::Error>> + Send;
    /// Settings of every user with notifications switched on.
    fn list_notification_enabled(
        &self,
    ) -> impl Future<Output = Result<Vec<SettingsRecord>, sqlx::Error>> + Send;
}

type SettingsRow = (
    i64,
    i64,
    i64,
    Option<String>,
    String,
    f64,
    Option<String>,
    bool,
    String,
    String,
    String,
);

const SETTINGS_COLUMNS: &str = "id, user_id, risk_level, api_key, model_type, monthly_investment, \
     persona, notification_enabled, notification_channels, created_at, updated_at";

fn from_row(row: SettingsRow) -> SettingsRecord {
    let (
        id,
        user_id,
        risk_level,
        api_key,
        model_type,
        monthly_investment,
        persona,
        notification_enabled,
        notification_channels,
        created_at,
        updated_at,
    ) = row;
    SettingsRecord {
        id,
        user_id,
        risk_level,
        api_key,
        model_type,
        monthly_investment,
        persona,
        notification_enabled,
        notification_channels,
        created_at: parse_ts(&created_at, "investment_settings.created_at"),
        updated_at: parse_ts(&updated_at, "investment_settings.updated_at"),
    }
}

impl SettingsStore for SqliteStore {
    async fn get_settings(&self, user_id: i64) -> Result<Option<SettingsRecord>, sqlx::Error> {
        let row: Option<SettingsRow> = sqlx::query_as(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM investment_settings WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn create_settings(
        &self,
        user_id: i64,
        settings: NewSettings,
    ) -> Result<SettingsRecord, sqlx::Error> {
        let now = fmt_ts(Utc::now());
        let row: SettingsRow = sqlx::query_as(&format!(
            "INSERT INTO investment_settings \
             (user_id, risk_level, api_key, model_type, monthly_investment, persona, \
              notification_enabled, notification_channels, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(settings.risk_level)
        .bind(&settings.api_key)
        .bind(&settings.model_type)
        .bind(settings.monthly_investment)
        .bind(&settings.persona)
        .bind(settings.notification_enabled)
        .bind(&settings.notification_channels)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }

    async fn update_settings(
        &self,
        user_id: i64,
        patch: SettingsPatch,
    ) -> Result<Option<SettingsRecord>, sqlx::Error> {
        let row: Option<SettingsRow> = sqlx::query_as(&format!(
            "UPDATE investment_settings SET \
               risk_level = COALESCE(?2, risk_level), \
               api_key = COALESCE(?3, api_key), \
               model_type = COALESCE(?4, model_type), \
               monthly_investment = COALESCE(?5, monthly_investment), \
               persona = COALESCE(?6, persona), \
               notification_enabled = COALESCE(?7, notification_enabled), \
               notification_channels = COALESCE(?8, notification_channels), \
               updated_at = ?9 \
             WHERE user_id = ?1 RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(patch.risk_level)
        .bind(&patch.api_key)
        .bind(&patch.model_type)
        .bind(patch.monthly_investment)
        .bind(&patch.persona)
        .bind(patch.notification_enabled)
        .bind(&patch.notification_channels)
        .bind(fmt_ts(Utc::now()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn list_notification_enabled(&self) -> Result<Vec<SettingsRecord>, sqlx::Error> {
        let rows: Vec<SettingsRow> = sqlx::query_as(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM investment_settings \
             WHERE notification_enabled = 1 ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::entities::test_support::{memory_store, user};

    pub(crate) fn defaults() -> NewSettings {
        NewSettings {
            risk_level: 5,
            api_key: None,
            model_type: "clova-x".into(),
            monthly_investment: 10.0,
            persona: None,
            notification_enabled: true,
            notification_channels: "app".into(),
        }
    }

    #[tokio::test]
    async fn create_then_patch() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        assert!(store.get_settings(alice.id).await.unwrap().is_none());

        store.create_settings(alice.id, defaults()).await.unwrap();
        let updated = store
            .update_settings(
                alice.id,
                SettingsPatch {
                    risk_level: Some(8),
                    persona: Some("공격적인 투자자".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.risk_level, 8);
        assert_eq!(updated.persona.as_deref(), Some("공격적인 투자자"));
        // Untouched columns keep their values.
        assert_eq!(updated.model_type, "clova-x");
        assert_eq!(updated.monthly_investment, 10.0);
    }

    #[tokio::test]
    async fn patch_without_row_returns_none() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        let res = store
            .update_settings(alice.id, SettingsPatch::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn second_row_for_same_user_fails() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        store.create_settings(alice.id, defaults()).await.unwrap();
        assert!(store.create_settings(alice.id, defaults()).await.is_err());
    }

    #[tokio::test]
    async fn only_enabled_users_are_listed() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        store.create_settings(alice.id, defaults()).await.unwrap();
        store
            .create_settings(
                bob.id,
                NewSettings {
                    notification_enabled: false,
                    ..defaults()
                },
            )
            .await
            .unwrap();

        let enabled = store.list_notification_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].user_id, alice.id);
    }
}
