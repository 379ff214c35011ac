use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes::{chat, etf, health, notification, portfolio, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "etf-server",
        description = "ETF portfolio, advice and notification API",
        version = "0.1.0",
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(user::UserApi::openapi());
    root.merge(etf::EtfApi::openapi());
    root.merge(portfolio::PortfolioApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(notification::NotificationApi::openapi());
    root
}
