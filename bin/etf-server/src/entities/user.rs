use crate::entities::{dao::NewUser, dao::UserRecord, fmt_ts, parse_ts, SqliteStore};
use chrono::Utc;
use std::future::Future;

pub trait UserStore: Send + Sync + 'static {
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<UserRecord, sqlx::Error>> + Send;
    fn get_user(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
    fn get_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
}

type UserRow = (i64, String, String, String, Option<String>, String, String);

const USER_COLUMNS: &str = "id, username, hashed_password, name, email, created_at, updated_at";

fn from_row(row: UserRow) -> UserRecord {
    let (id, username, hashed_password, name, email, created_at, updated_at) = row;
    UserRecord {
        id,
        username,
        hashed_password,
        name,
        email,
        created_at: parse_ts(&created_at, "users.created_at"),
        updated_at: parse_ts(&updated_at, "users.updated_at"),
    }
}

impl UserStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, sqlx::Error> {
        let now = fmt_ts(Utc::now());
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (username, hashed_password, name, email, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(from_row(row))
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(from_row))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(from_row))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(from_row))
    }
}
