//! Bearer-token authentication.
//!
//! [`require_user`] is applied as a `route_layer` on protected routers: it
//! resolves the token to a [`UserRecord`] and stores it as a
//! [`CurrentUser`] request extension before any body is parsed.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::services::security::decode_access_token;
use crate::state::AppState;

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ServerError::Unauthorized("Not authenticated".into()))?;
    let username = decode_access_token(token, &state.config.jwt_secret)
        .ok_or_else(|| ServerError::Unauthorized("Could not validate credentials".into()))?;

    let user = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ServerError::NotFound("사용자를 찾을 수 없습니다.".into()))?;

    tracing::Span::current().record("user_id", user.id);
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_auth(value: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(&with_auth("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_auth("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&with_auth("Bearer")), None);
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&bare), None);
    }
}
