//! Conversational ETF advice, plain and streamed, plus stored history.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

use crate::entities::{
    ChatMessageRecord, ChatRole, ChatStore, PortfolioStore, SettingsStore, UserRecord,
};
use crate::error::ServerError;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::auth::require_user;
use crate::middleware::CurrentUser;
use crate::schemas::chat::{
    ChatHistoryDeleted, ChatHistoryQuery, ChatMessageResponse, ChatRequest, ChatResponse,
    DEFAULT_HISTORY_LIMIT,
};
use crate::services::ai::{chat_system_prompt, AnalysisRequest, PromptMessage};
use crate::state::AppState;
use crate::timezone;

/// Frames buffered between the upstream reader and the SSE response.
const STREAM_BUFFER: usize = 32;

const DONE_FRAME: &str = "[DONE]";

#[derive(OpenApi)]
#[openapi(
    paths(chat, chat_stream, history, delete_history),
    components(schemas(ChatRequest, ChatResponse, ChatMessageResponse, ChatHistoryDeleted))
)]
pub struct ChatApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/chat/history", get(history).delete(delete_history))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

/// System prompt, replayed history and the new message, in that order.
async fn build_request(
    state: &AppState,
    user: &UserRecord,
    content: &str,
) -> Result<AnalysisRequest, sqlx::Error> {
    let store = &state.store;
    let settings = store.get_settings(user.id).await?;
    let portfolio = store.list_portfolios(user.id).await?;
    let history = store
        .history_for_prompt(user.id, state.config.chat_history_limit)
        .await?;
    let today = timezone::local_date(Utc::now(), state.config.timezone_offset_hours);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::new(
        "system",
        chat_system_prompt(&user.name, settings.as_ref(), &portfolio, today),
    ));
    messages.extend(
        history
            .into_iter()
            .map(|m| PromptMessage::new(m.role, m.content)),
    );
    messages.push(PromptMessage::new(ChatRole::User.to_string(), content));
    Ok(AnalysisRequest::for_settings(messages, settings.as_ref()))
}

fn content_frame(content: &str) -> Event {
    Event::default().data(json!({ "content": content }).to_string())
}

/// Ask the advisor and wait for the whole answer.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    security(("bearer" = [])),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Advisor answer", body = ChatResponse),
        (status = 500, description = "AI service failure"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    let request = build_request(&state, &user, &req.content).await?;
    state
        .store
        .append_message(user.id, ChatRole::User, &req.content)
        .await?;

    let answer = state
        .advisor
        .analyze(&request)
        .await
        .map_err(|e| ServerError::Ai(e.to_string()))?;

    state
        .store
        .append_message(user.id, ChatRole::Assistant, &answer)
        .await?;
    info!(user_id = user.id, answer_len = answer.len(), "chat answered");
    Ok(Json(ChatResponse { content: answer }))
}

/// Ask the advisor and relay the answer as server-sent events.
#[utoipa::path(
    post,
    path = "/chat/stream",
    tag = "chat",
    security(("bearer" = [])),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Content frames followed by [DONE]", body = String, content_type = "text/event-stream"),
    )
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Response, ServerError> {
    let request = build_request(&state, &user, &req.content).await?;
    state
        .store
        .append_message(user.id, ChatRole::User, &req.content)
        .await?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(STREAM_BUFFER);
    tokio::spawn(async move {
        let user_id = user.id;
        let mut answer = String::new();
        let mut failure = None;

        match state.advisor.analyze_stream(&request).await {
            Ok(mut chunks) => {
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(text) if text.is_empty() => {}
                        Ok(text) => {
                            if tx.send(Ok(content_frame(&text))).await.is_err() {
                                debug!(user_id, "chat stream client went away");
                                return;
                            }
                            answer.push_str(&text);
                        }
                        Err(e) => {
                            failure = Some(e.to_string());
                            break;
                        }
                    }
                }
            }
            Err(e) => failure = Some(e.to_string()),
        }

        if let Some(message) = failure {
            warn!(user_id, error = %message, "chat stream failed");
            let _ = tx
                .send(Ok(content_frame(&format!("AI 서비스 오류: {message}"))))
                .await;
        } else if let Err(e) = state
            .store
            .append_message(user_id, ChatRole::Assistant, &answer)
            .await
        {
            warn!(user_id, error = %e, "failed to persist streamed answer");
        } else {
            info!(user_id, answer_len = answer.len(), "chat stream answered");
        }
        let _ = tx.send(Ok(Event::default().data(DONE_FRAME))).await;
    });

    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// Stored messages, newest first.
#[utoipa::path(
    get,
    path = "/chat/history",
    tag = "chat",
    security(("bearer" = [])),
    params(ChatHistoryQuery),
    responses((status = 200, description = "Chat history", body = [ChatMessageResponse]))
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedQuery(query): ValidatedQuery<ChatHistoryQuery>,
) -> Result<Json<Vec<ChatMessageResponse>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state.store.recent_messages(user.id, limit).await?;
    Ok(Json(messages.iter().map(ChatMessageRecord::to_response).collect()))
}

#[utoipa::path(
    delete,
    path = "/chat/history",
    tag = "chat",
    security(("bearer" = [])),
    responses((status = 200, description = "Number of deleted messages", body = ChatHistoryDeleted))
)]
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ChatHistoryDeleted>, ServerError> {
    let deleted = state.store.delete_messages(user.id).await?;
    info!(user_id = user.id, deleted, "chat history cleared");
    Ok(Json(ChatHistoryDeleted { deleted }))
}
