use crate::entities::{
    dao::{NewNotification, NotificationRecord, NotificationType},
    fmt_ts, parse_opt_ts, parse_ts, SqliteStore,
};
use chrono::{DateTime, Utc};
use std::future::Future;

pub trait NotificationStore: Send + Sync + 'static {
    fn create_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<NotificationRecord, sqlx::Error>> + Send;
    /// Newest first.
    fn list_notifications(
        &self,
        user_id: i64,
        skip: i64,
        limit: i64,
        unread_only: bool,
    ) -> impl Future<Output = Result<Vec<NotificationRecord>, sqlx::Error>> + Send;
    fn get_notification(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<NotificationRecord>, sqlx::Error>> + Send;
    /// Flag as read; `read_at` keeps its first value.
    fn mark_read(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<NotificationRecord>, sqlx::Error>> + Send;
    fn mark_all_read(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
    fn delete_notification(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn count_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
    /// Most recent notification of `kind` for the user.
    fn latest_of_type(
        &self,
        user_id: i64,
        kind: NotificationType,
    ) -> impl Future<Output = Result<Option<NotificationRecord>, sqlx::Error>> + Send;
    /// Whether a notification of `kind` was created at or after `since`.
    fn exists_since(
        &self,
        user_id: i64,
        kind: NotificationType,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

type NotificationRow = (
    i64,
    i64,
    String,
    String,
    String,
    bool,
    Option<String>,
    String,
    Option<String>,
);

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, content, type, is_read, sent_via, created_at, read_at";

fn from_row(row: NotificationRow) -> NotificationRecord {
    let (id, user_id, title, content, kind, is_read, sent_via, created_at, read_at) = row;
    NotificationRecord {
        id,
        user_id,
        title,
        content,
        kind,
        is_read,
        sent_via,
        created_at: parse_ts(&created_at, "notifications.created_at"),
        read_at: parse_opt_ts(read_at, "notifications.read_at"),
    }
}

impl NotificationStore for SqliteStore {
    async fn create_notification(
        &self,
        n: NewNotification,
    ) -> Result<NotificationRecord, sqlx::Error> {
        let row: NotificationRow = sqlx::query_as(&format!(
            "INSERT INTO notifications (user_id, title, content, type, is_read, sent_via, created_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(n.user_id)
        .bind(&n.title)
        .bind(&n.content)
        .bind(n.kind.as_ref())
        .bind(n.sent_via.map(|c| c.to_string()))
        .bind(fmt_ts(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }

    async fn list_notifications(
        &self,
        user_id: i64,
        skip: i64,
        limit: i64,
        unread_only: bool,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0) \
             ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get_notification(&self, id: i64) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn mark_read(&self, id: i64) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?2) \
             WHERE id = ?1 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(fmt_ts(Utc::now()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ?2 \
             WHERE user_id = ?1 AND is_read = 0",
        )
        .bind(user_id)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_notifications(&self, user_id: i64, unread_only: bool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn latest_of_type(
        &self,
        user_id: i64,
        kind: NotificationType,
    ) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = ?1 AND type = ?2 ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(kind.as_ref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn exists_since(
        &self,
        user_id: i64,
        kind: NotificationType,
        since: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let (found,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM notifications \
             WHERE user_id = ?1 AND type = ?2 AND created_at >= ?3)",
        )
        .bind(user_id)
        .bind(kind.as_ref())
        .bind(fmt_ts(since))
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::dao::NotificationChannel;
    use crate::entities::test_support::{memory_store, user};

    fn note(user_id: i64, kind: NotificationType, content: &str) -> NewNotification {
        NewNotification {
            user_id,
            title: kind.title().to_owned(),
            content: content.to_owned(),
            kind,
            sent_via: Some(NotificationChannel::App),
        }
    }

    #[tokio::test]
    async fn unread_filter_and_counts() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        let first = store
            .create_notification(note(alice.id, NotificationType::System, "one"))
            .await
            .unwrap();
        store
            .create_notification(note(alice.id, NotificationType::System, "two"))
            .await
            .unwrap();
        assert_eq!(first.sent_via.as_deref(), Some("app"));

        let read = store.mark_read(first.id).await.unwrap().unwrap();
        assert!(read.is_read);
        let stamp = read.read_at.unwrap();
        let again = store.mark_read(first.id).await.unwrap().unwrap();
        assert_eq!(again.read_at.unwrap(), stamp);

        assert_eq!(store.count_notifications(alice.id, true).await.unwrap(), 1);
        assert_eq!(store.count_notifications(alice.id, false).await.unwrap(), 2);
        let unread = store.list_notifications(alice.id, 0, 100, true).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].content, "two");

        assert_eq!(store.mark_all_read(alice.id).await.unwrap(), 1);
        assert_eq!(store.mark_all_read(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn listing_is_newest_first_with_paging() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        for i in 0..3 {
            store
                .create_notification(note(alice.id, NotificationType::System, &format!("n{i}")))
                .await
                .unwrap();
        }
        let page = store.list_notifications(alice.id, 1, 1, false).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "n1");
    }

    #[tokio::test]
    async fn latest_and_since_filter_by_kind() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        let before = Utc::now() - chrono::Duration::seconds(1);
        store
            .create_notification(note(alice.id, NotificationType::PortfolioAnalysis, "old"))
            .await
            .unwrap();
        store
            .create_notification(note(alice.id, NotificationType::PortfolioAnalysis, "new"))
            .await
            .unwrap();

        let latest = store
            .latest_of_type(alice.id, NotificationType::PortfolioAnalysis)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.content, "new");
        assert!(store
            .latest_of_type(alice.id, NotificationType::AiAnalysis)
            .await
            .unwrap()
            .is_none());

        let kind = NotificationType::PortfolioAnalysis;
        assert!(store.exists_since(alice.id, kind, before).await.unwrap());
        let later = Utc::now() + chrono::Duration::hours(1);
        assert!(!store.exists_since(alice.id, kind, later).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let store = memory_store().await;
        let alice = user(&store, "alice").await;
        let n = store
            .create_notification(note(alice.id, NotificationType::System, "x"))
            .await
            .unwrap();
        assert!(store.delete_notification(n.id).await.unwrap());
        assert!(!store.delete_notification(n.id).await.unwrap());
        assert!(store.get_notification(n.id).await.unwrap().is_none());
    }
}
