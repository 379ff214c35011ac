//! In-app notification inbox and the user's delivery preferences.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{middleware, Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::{
    NotificationRecord, NotificationStore, SettingsPatch, SettingsStore, UserRecord,
};
use crate::error::ServerError;
use crate::extract::{PathParam, ValidatedJson, ValidatedQuery};
use crate::middleware::auth::require_user;
use crate::middleware::CurrentUser;
use crate::schemas::notification::{
    CountResponse, NotificationCountQuery, NotificationListQuery, NotificationResponse,
    NotificationSettingsResponse, NotificationSettingsUpdate, ReadAllResponse,
    TestNotificationResponse,
};
use crate::schemas::MessageResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;
const NOTIFICATION_NOT_FOUND: &str = "알림을 찾을 수 없습니다";
const SETTINGS_NOT_FOUND: &str = "알림 설정을 찾을 수 없습니다";

#[derive(OpenApi)]
#[openapi(
    paths(
        list_notifications,
        count_notifications,
        get_notification,
        mark_read,
        mark_all_read,
        delete_notification,
        get_notification_settings,
        update_notification_settings,
        send_test_notification,
    ),
    components(schemas(
        NotificationResponse,
        CountResponse,
        ReadAllResponse,
        NotificationSettingsResponse,
        NotificationSettingsUpdate,
        TestNotificationResponse
    ))
)]
pub struct NotificationApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/count", get(count_notifications))
        .route("/notifications/read-all", put(mark_all_read))
        .route(
            "/notifications/settings",
            get(get_notification_settings).put(update_notification_settings),
        )
        .route("/notifications/test", post(send_test_notification))
        .route(
            "/notifications/{id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/notifications/{id}/read", put(mark_read))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Load a notification, refusing other users' with `forbidden`.
async fn owned_notification(
    state: &AppState,
    user: &UserRecord,
    id: i64,
    forbidden: &str,
) -> Result<NotificationRecord, ServerError> {
    let notification = state
        .store
        .get_notification(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(NOTIFICATION_NOT_FOUND.into()))?;
    if notification.user_id != user.id {
        return Err(ServerError::Forbidden(forbidden.into()));
    }
    Ok(notification)
}

/// Newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notification",
    security(("bearer" = [])),
    params(NotificationListQuery),
    responses(
        (status = 200, description = "Notifications", body = [NotificationResponse]),
        (status = 422, description = "Bad paging parameters"),
    )
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedQuery(query): ValidatedQuery<NotificationListQuery>,
) -> Result<Json<Vec<NotificationResponse>>, ServerError> {
    let notifications = state
        .store
        .list_notifications(
            user.id,
            query.skip.unwrap_or(0),
            query.limit.unwrap_or(DEFAULT_LIMIT),
            query.unread_only.unwrap_or(false),
        )
        .await?;
    Ok(Json(
        notifications
            .iter()
            .map(NotificationRecord::to_response)
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/notifications/count",
    tag = "notification",
    security(("bearer" = [])),
    params(NotificationCountQuery),
    responses((status = 200, description = "Number of (unread) notifications", body = CountResponse))
)]
pub async fn count_notifications(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedQuery(query): ValidatedQuery<NotificationCountQuery>,
) -> Result<Json<CountResponse>, ServerError> {
    let count = state
        .store
        .count_notifications(user.id, query.unread_only.unwrap_or(true))
        .await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/notifications/{id}",
    tag = "notification",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification", body = NotificationResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such notification"),
    )
)]
pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<NotificationResponse>, ServerError> {
    let notification =
        owned_notification(&state, &user, id, "다른 사용자의 알림을 조회할 수 없습니다").await?;
    Ok(Json(notification.to_response()))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    tag = "notification",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such notification"),
    )
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<NotificationResponse>, ServerError> {
    owned_notification(&state, &user, id, "다른 사용자의 알림을 수정할 수 없습니다").await?;
    let notification = state
        .store
        .mark_read(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(NOTIFICATION_NOT_FOUND.into()))?;
    Ok(Json(notification.to_response()))
}

#[utoipa::path(
    put,
    path = "/notifications/read-all",
    tag = "notification",
    security(("bearer" = [])),
    responses((status = 200, description = "Unread notifications marked read", body = ReadAllResponse))
)]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ReadAllResponse>, ServerError> {
    let count = state.store.mark_all_read(user.id).await?;
    info!(user_id = user.id, count, "notifications marked read");
    Ok(Json(ReadAllResponse {
        message: format!("{count}개의 알림을 읽음으로 표시했습니다"),
        count,
    }))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notification",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification deleted", body = MessageResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such notification"),
    )
)]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ServerError> {
    owned_notification(&state, &user, id, "다른 사용자의 알림을 삭제할 수 없습니다").await?;
    if !state.store.delete_notification(id).await? {
        return Err(ServerError::NotFound(NOTIFICATION_NOT_FOUND.into()));
    }
    Ok(Json(MessageResponse::new("알림이 삭제되었습니다")))
}

#[utoipa::path(
    get,
    path = "/notifications/settings",
    tag = "notification",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Delivery preferences", body = NotificationSettingsResponse),
        (status = 404, description = "No investment settings yet"),
    )
)]
pub async fn get_notification_settings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<NotificationSettingsResponse>, ServerError> {
    let settings = state
        .store
        .get_settings(user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound(SETTINGS_NOT_FOUND.into()))?;
    Ok(Json(settings.to_notification_settings()))
}

#[utoipa::path(
    put,
    path = "/notifications/settings",
    tag = "notification",
    security(("bearer" = [])),
    request_body = NotificationSettingsUpdate,
    responses(
        (status = 200, description = "Updated preferences", body = NotificationSettingsResponse),
        (status = 404, description = "No investment settings yet"),
        (status = 422, description = "Unknown channel"),
    )
)]
pub async fn update_notification_settings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<NotificationSettingsUpdate>,
) -> Result<Json<NotificationSettingsResponse>, ServerError> {
    let patch = SettingsPatch {
        notification_enabled: req.notification_enabled,
        notification_channels: req.notification_channels,
        ..SettingsPatch::default()
    };
    let settings = state
        .store
        .update_settings(user.id, patch)
        .await?
        .ok_or_else(|| ServerError::NotFound(SETTINGS_NOT_FOUND.into()))?;
    info!(
        user_id = user.id,
        enabled = settings.notification_enabled,
        channels = %settings.notification_channels,
        "notification settings updated"
    );
    Ok(Json(settings.to_notification_settings()))
}

/// Send a `system` notice so clients can check their inbox and e-mail setup.
#[utoipa::path(
    post,
    path = "/notifications/test",
    tag = "notification",
    security(("bearer" = [])),
    responses((status = 200, description = "Test notification created", body = TestNotificationResponse))
)]
pub async fn send_test_notification(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<TestNotificationResponse>, ServerError> {
    let settings = state.store.get_settings(user.id).await?;
    let notification = state
        .notifier
        .send_system(
            &user,
            settings.as_ref(),
            "테스트 알림",
            &format!("{}님, 알림 시스템이 정상적으로 작동하고 있습니다.", user.name),
        )
        .await?;
    Ok(Json(TestNotificationResponse {
        message: "테스트 알림이 전송되었습니다".into(),
        notification_id: notification.id,
    }))
}
