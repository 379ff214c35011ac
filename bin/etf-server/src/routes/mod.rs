//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `ETF_ENABLE_SWAGGER=false`)
//! - Public routes (health, signup/login, ETF catalogue)
//! - Bearer-protected routes (settings, portfolio, chat, notifications)

pub mod chat;
pub mod doc;
pub mod etf;
pub mod health;
pub mod notification;
pub mod portfolio;
pub mod user;

use std::sync::Arc;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(user::router(state.clone()))
        .merge(etf::router(state.clone()))
        .merge(portfolio::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(notification::router(state.clone()));

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
