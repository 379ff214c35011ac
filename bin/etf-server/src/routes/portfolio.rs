//! Recurring investment plans of the authenticated user.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, put};
use axum::{middleware, Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::{
    EtfStore, NewPortfolio, PortfolioEntry, PortfolioRecord, PortfolioStore, SettingsRecord,
    SettingsStore, UserRecord,
};
use crate::error::ServerError;
use crate::extract::{PathParam, ValidatedJson, ValidatedQuery};
use crate::middleware::auth::require_user;
use crate::middleware::CurrentUser;
use crate::schemas::portfolio::{
    CreatePortfolioRequest, PortfolioOverview, PortfolioResponse, UpdatePortfolioQuery,
};
use crate::schemas::MessageResponse;
use crate::state::AppState;

const PORTFOLIO_NOT_FOUND: &str = "포트폴리오를 찾을 수 없습니다.";

#[derive(OpenApi)]
#[openapi(
    paths(list_portfolio, create_portfolio, update_portfolio, delete_portfolio, delete_all),
    components(schemas(CreatePortfolioRequest, PortfolioResponse, PortfolioOverview))
)]
pub struct PortfolioApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/portfolio",
            get(list_portfolio).post(create_portfolio).delete(delete_all),
        )
        .route("/portfolio/{id}", put(update_portfolio).delete(delete_portfolio))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// Load an entry owned by `user`; foreign entries look missing.
async fn owned_portfolio(
    state: &AppState,
    user: &UserRecord,
    id: i64,
) -> Result<PortfolioRecord, ServerError> {
    state
        .store
        .get_portfolio(id)
        .await?
        .filter(|p| p.user_id == user.id)
        .ok_or_else(|| ServerError::NotFound(PORTFOLIO_NOT_FOUND.into()))
}

#[utoipa::path(
    get,
    path = "/portfolio",
    tag = "portfolio",
    security(("bearer" = [])),
    responses((status = 200, description = "Entries and settings", body = PortfolioOverview))
)]
pub async fn list_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<PortfolioOverview>, ServerError> {
    let entries = state.store.list_portfolios(user.id).await?;
    let settings = state.store.get_settings(user.id).await?;
    Ok(Json(PortfolioOverview {
        portfolios: entries.iter().map(PortfolioEntry::to_response).collect(),
        settings: settings.as_ref().map(SettingsRecord::to_response),
    }))
}

#[utoipa::path(
    post,
    path = "/portfolio",
    tag = "portfolio",
    security(("bearer" = [])),
    request_body = CreatePortfolioRequest,
    responses(
        (status = 200, description = "Entry created", body = PortfolioResponse),
        (status = 404, description = "Unknown ETF"),
        (status = 422, description = "Invalid amount or day"),
    )
)]
pub async fn create_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<CreatePortfolioRequest>,
) -> Result<Json<PortfolioResponse>, ServerError> {
    let etf = state
        .store
        .get_etf(req.etf_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("ETF를 찾을 수 없습니다.".into()))?;
    let portfolio = state
        .store
        .create_portfolio(NewPortfolio {
            user_id: user.id,
            etf_id: etf.id,
            monthly_investment: req.monthly_investment,
            cycle: req.cycle,
            day: req.day,
        })
        .await?;
    info!(
        user_id = user.id,
        portfolio_id = portfolio.id,
        symbol = %etf.symbol,
        "portfolio entry created"
    );
    Ok(Json(PortfolioEntry { portfolio, etf }.to_response()))
}

#[utoipa::path(
    put,
    path = "/portfolio/{id}",
    tag = "portfolio",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Portfolio entry id"), UpdatePortfolioQuery),
    responses(
        (status = 200, description = "Amount updated", body = MessageResponse),
        (status = 404, description = "No such entry"),
    )
)]
pub async fn update_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
    ValidatedQuery(query): ValidatedQuery<UpdatePortfolioQuery>,
) -> Result<Json<MessageResponse>, ServerError> {
    let portfolio = owned_portfolio(&state, &user, id).await?;
    if !state
        .store
        .update_portfolio_amount(portfolio.id, query.monthly_investment)
        .await?
    {
        return Err(ServerError::NotFound(PORTFOLIO_NOT_FOUND.into()));
    }
    Ok(Json(MessageResponse::new("포트폴리오가 업데이트되었습니다.")))
}

#[utoipa::path(
    delete,
    path = "/portfolio/{id}",
    tag = "portfolio",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Portfolio entry id")),
    responses(
        (status = 200, description = "Entry deleted", body = MessageResponse),
        (status = 404, description = "No such entry"),
    )
)]
pub async fn delete_portfolio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ServerError> {
    let portfolio = owned_portfolio(&state, &user, id).await?;
    if !state.store.delete_portfolio(portfolio.id).await? {
        return Err(ServerError::NotFound(PORTFOLIO_NOT_FOUND.into()));
    }
    info!(user_id = user.id, portfolio_id = id, "portfolio entry deleted");
    Ok(Json(MessageResponse::new("포트폴리오가 삭제되었습니다.")))
}

#[utoipa::path(
    delete,
    path = "/portfolio",
    tag = "portfolio",
    security(("bearer" = [])),
    responses((status = 200, description = "All entries deleted", body = MessageResponse))
)]
pub async fn delete_all(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ServerError> {
    let deleted = state.store.delete_user_portfolios(user.id).await?;
    info!(user_id = user.id, deleted, "portfolio cleared");
    Ok(Json(MessageResponse::new("모든 포트폴리오가 삭제되었습니다.")))
}
