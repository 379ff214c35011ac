use crate::entities::{
    dao::{ChatMessageRecord, ChatRole},
    fmt_ts, parse_ts, SqliteStore,
};
use chrono::Utc;
use std::future::Future;

pub trait ChatStore: Send + Sync + 'static {
    fn append_message(
        &self,
        user_id: i64,
        role: ChatRole,
        content: &str,
    ) -> impl Future<Output = Result<ChatMessageRecord, sqlx::Error>> + Send;
    /// Newest first.
    fn recent_messages(
        &self,
        user_id: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ChatMessageRecord>, sqlx::Error>> + Send;
    /// The last `limit` messages in chronological order, for prompt replay.
    fn history_for_prompt(
        &self,
        user_id: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ChatMessageRecord>, sqlx::Error>> + Send;
    fn delete_messages(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

type ChatRow = (i64, i64, String, String, String);

fn from_row((id, user_id, role, content, created_at): ChatRow) -> ChatMessageRecord {
    ChatMessageRecord {
        id,
        user_id,
        role,
        content,
        created_at: parse_ts(&created_at, "chat_messages.created_at"),
    }
}

impl ChatStore for SqliteStore {
    async fn append_message(
        &self,
        user_id: i64,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessageRecord, sqlx::Error> {
        let row: ChatRow = sqlx::query_as(
            "INSERT INTO chat_messages (user_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4) RETURNING id, user_id, role, content, created_at",
        )
        .bind(user_id)
        .bind(role.as_ref())
        .bind(content)
        .bind(fmt_ts(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }

    async fn recent_messages(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ChatMessageRecord>, sqlx::Error> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, user_id, role, content, created_at FROM chat_messages \
             WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn history_for_prompt(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ChatMessageRecord>, sqlx::Error> {
        let mut messages = self.recent_messages(user_id, limit).await?;
        messages.reverse();
        Ok(messages)
    }

    async fn delete_messages(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
