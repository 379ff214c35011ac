//! Account routes: signup, login and the caller's profile.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::{NewUser, UserStore};
use crate::error::ServerError;
use crate::extract::ValidatedJson;
use crate::middleware::auth::require_user;
use crate::middleware::CurrentUser;
use crate::schemas::user::{LoginRequest, LoginResponse, SignupRequest, UserResponse};
use crate::schemas::MessageResponse;
use crate::services::security::{create_access_token, hash_password, verify_password};
use crate::state::AppState;

const DUPLICATE_USERNAME: &str = "이미 존재하는 아이디입니다.";
const DUPLICATE_EMAIL: &str = "이미 사용 중인 이메일입니다.";
const BAD_CREDENTIALS: &str = "아이디 또는 비밀번호가 올바르지 않습니다.";

#[derive(OpenApi)]
#[openapi(
    paths(signup, login, me),
    components(schemas(SignupRequest, LoginRequest, LoginResponse, UserResponse, MessageResponse))
)]
pub struct UserApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .merge(protected)
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "user",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = MessageResponse),
        (status = 400, description = "Username or e-mail already taken"),
        (status = 422, description = "Invalid fields"),
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<Json<MessageResponse>, ServerError> {
    let store = &state.store;
    if store.get_user_by_username(&req.username).await?.is_some() {
        return Err(ServerError::BadRequest(DUPLICATE_USERNAME.into()));
    }
    if let Some(email) = &req.email {
        if store.get_user_by_email(email).await?.is_some() {
            return Err(ServerError::BadRequest(DUPLICATE_EMAIL.into()));
        }
    }

    let hashed_password = hash_password(req.password).await?;
    let user = store
        .create_user(NewUser {
            username: req.username,
            hashed_password,
            name: req.name,
            email: req.email,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent signup.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServerError::BadRequest(duplicate_detail(db.message()).into())
            }
            other => ServerError::Database(other),
        })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(MessageResponse::new("회원가입 성공")))
}

/// Detail for a unique violation; SQLite names the column as `users.<col>`.
fn duplicate_detail(message: &str) -> &'static str {
    if message.contains("users.email") {
        DUPLICATE_EMAIL
    } else {
        DUPLICATE_USERNAME
    }
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/login",
    tag = "user",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Wrong username or password"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let Some(user) = state.store.get_user_by_username(&req.username).await? else {
        return Err(ServerError::BadRequest(BAD_CREDENTIALS.into()));
    };
    if !verify_password(req.password, user.hashed_password.clone()).await? {
        return Err(ServerError::BadRequest(BAD_CREDENTIALS.into()));
    }

    let access_token = create_access_token(
        &user.username,
        &state.config.jwt_secret,
        state.config.access_token_expire_minutes,
    )?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "로그인 성공".into(),
        access_token,
        token_type: "bearer".into(),
        name: user.name,
    }))
}

/// Profile of the authenticated caller.
#[utoipa::path(
    get,
    path = "/me",
    tag = "user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(user.to_response())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::test_support::{memory_store, user};

    async fn collision_detail(username: &str, email: &str) -> &'static str {
        let store = memory_store().await;
        user(&store, "taken").await;
        let err = store
            .create_user(NewUser {
                username: username.to_owned(),
                hashed_password: "hash".to_owned(),
                name: "other".to_owned(),
                email: Some(email.to_owned()),
            })
            .await
            .unwrap_err();
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => duplicate_detail(db.message()),
            other => panic!("expected a unique violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn email_collision_names_the_email() {
        assert_eq!(
            collision_detail("fresh", "taken@example.com").await,
            DUPLICATE_EMAIL
        );
    }

    #[tokio::test]
    async fn username_collision_names_the_username() {
        assert_eq!(
            collision_detail("taken", "fresh@example.com").await,
            DUPLICATE_USERNAME
        );
    }
}
