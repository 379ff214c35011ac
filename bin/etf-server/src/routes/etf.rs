//! ETF catalogue and per-user investment settings.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{middleware, Extension, Json, Router};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::entities::{
    EtfRecord, EtfStore, PortfolioStore, SettingsRecord, SettingsStore, SqliteStore,
};
use crate::error::ServerError;
use crate::extract::ValidatedJson;
use crate::middleware::auth::require_user;
use crate::middleware::CurrentUser;
use crate::schemas::etf::{
    EtfResponse, EtfSymbolsRequest, SettingsRequest, SettingsResponse, UserSettingsResponse,
};
use crate::schemas::MessageResponse;
use crate::state::AppState;

const SETTINGS_EXIST: &str = "이미 설정이 존재합니다.";
pub(crate) const SETTINGS_NOT_FOUND: &str = "설정을 찾을 수 없습니다.";

#[derive(OpenApi)]
#[openapi(
    paths(list_etfs, init_etfs, get_settings, create_settings, update_settings, update_etfs),
    components(schemas(
        EtfResponse,
        SettingsRequest,
        SettingsResponse,
        UserSettingsResponse,
        EtfSymbolsRequest
    ))
)]
pub struct EtfApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route(
            "/users/me/settings",
            get(get_settings).post(create_settings).put(update_settings),
        )
        .route("/users/me/etfs", put(update_etfs))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/etfs", get(list_etfs))
        .route("/init-etfs", post(init_etfs))
        .merge(protected)
}

/// Distinct ETFs held by `user_id`, in portfolio order.
pub(crate) async fn held_etfs(
    store: &SqliteStore,
    user_id: i64,
) -> Result<Vec<EtfRecord>, sqlx::Error> {
    let mut seen = HashSet::new();
    Ok(store
        .list_portfolios(user_id)
        .await?
        .into_iter()
        .map(|entry| entry.etf)
        .filter(|etf| seen.insert(etf.id))
        .collect())
}

/// Replace the user's portfolio with one monthly entry per known symbol.
async fn replace_by_symbols(
    store: &SqliteStore,
    user_id: i64,
    symbols: &[String],
    monthly_investment: f64,
) -> Result<(), sqlx::Error> {
    let mut ids = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match store.get_etf_by_symbol(symbol.trim()).await? {
            Some(etf) if !ids.contains(&etf.id) => ids.push(etf.id),
            Some(_) => {}
            None => debug!(symbol = %symbol, "skipping unknown ETF symbol"),
        }
    }
    store
        .replace_portfolios(user_id, ids, monthly_investment)
        .await
}

async fn settings_view(
    store: &SqliteStore,
    user_id: i64,
    settings: Option<SettingsRecord>,
) -> Result<UserSettingsResponse, sqlx::Error> {
    let etfs = held_etfs(store, user_id).await?;
    Ok(UserSettingsResponse {
        settings: settings.as_ref().map(SettingsRecord::to_response),
        etfs: etfs.iter().map(EtfRecord::to_response).collect(),
    })
}

/// The whole ETF catalogue, ordered by id.
#[utoipa::path(
    get,
    path = "/etfs",
    tag = "etf",
    responses((status = 200, description = "ETF catalogue", body = [EtfResponse]))
)]
pub async fn list_etfs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EtfResponse>>, ServerError> {
    let etfs = state.store.list_etfs().await?;
    Ok(Json(etfs.iter().map(EtfRecord::to_response).collect()))
}

/// Insert any missing catalogue entries.
#[utoipa::path(
    post,
    path = "/init-etfs",
    tag = "etf",
    responses((status = 200, description = "Catalogue seeded", body = MessageResponse))
)]
pub async fn init_etfs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ServerError> {
    let inserted = state.store.seed_etfs().await?;
    info!(inserted, "ETF catalogue initialised");
    Ok(Json(MessageResponse::new("ETF 데이터가 초기화되었습니다.")))
}

#[utoipa::path(
    get,
    path = "/users/me/settings",
    tag = "settings",
    security(("bearer" = [])),
    responses((status = 200, description = "Settings and held ETFs", body = UserSettingsResponse))
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<UserSettingsResponse>, ServerError> {
    let settings = state.store.get_settings(user.id).await?;
    Ok(Json(settings_view(&state.store, user.id, settings).await?))
}

#[utoipa::path(
    post,
    path = "/users/me/settings",
    tag = "settings",
    security(("bearer" = [])),
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings created", body = UserSettingsResponse),
        (status = 400, description = "Settings already exist"),
        (status = 422, description = "Invalid fields"),
    )
)]
pub async fn create_settings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<SettingsRequest>,
) -> Result<Json<UserSettingsResponse>, ServerError> {
    let store = &state.store;
    if store.get_settings(user.id).await?.is_some() {
        return Err(ServerError::BadRequest(SETTINGS_EXIST.into()));
    }
    let settings = store
        .create_settings(user.id, req.to_new())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServerError::BadRequest(SETTINGS_EXIST.into())
            }
            other => ServerError::Database(other),
        })?;
    if let Some(symbols) = &req.etf_symbols {
        replace_by_symbols(store, user.id, symbols, settings.monthly_investment).await?;
    }
    info!(user_id = user.id, "investment settings created");
    Ok(Json(settings_view(store, user.id, Some(settings)).await?))
}

#[utoipa::path(
    put,
    path = "/users/me/settings",
    tag = "settings",
    security(("bearer" = [])),
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = UserSettingsResponse),
        (status = 404, description = "No settings yet"),
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<SettingsRequest>,
) -> Result<Json<UserSettingsResponse>, ServerError> {
    let store = &state.store;
    let settings = store
        .update_settings(user.id, req.to_patch())
        .await?
        .ok_or_else(|| ServerError::NotFound(SETTINGS_NOT_FOUND.into()))?;
    if let Some(symbols) = &req.etf_symbols {
        replace_by_symbols(store, user.id, symbols, settings.monthly_investment).await?;
    }
    info!(user_id = user.id, "investment settings updated");
    Ok(Json(settings_view(store, user.id, Some(settings)).await?))
}

/// Replace the held ETFs by symbol; returns the resulting list.
#[utoipa::path(
    put,
    path = "/users/me/etfs",
    tag = "settings",
    security(("bearer" = [])),
    request_body = EtfSymbolsRequest,
    responses(
        (status = 200, description = "Held ETFs", body = [EtfResponse]),
        (status = 404, description = "No settings yet"),
    )
)]
pub async fn update_etfs(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<EtfSymbolsRequest>,
) -> Result<Json<Vec<EtfResponse>>, ServerError> {
    let store = &state.store;
    let settings = store
        .get_settings(user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound(SETTINGS_NOT_FOUND.into()))?;
    replace_by_symbols(store, user.id, &req.etf_symbols, settings.monthly_investment).await?;
    let etfs = held_etfs(store, user.id).await?;
    Ok(Json(etfs.iter().map(EtfRecord::to_response).collect()))
}
