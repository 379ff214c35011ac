mod common;

use axum::http::StatusCode;
use common::{authed, spawn_app, spawn_app_with_reply};
use serde_json::{json, Value};

#[tokio::test]
async fn chat_answers_and_records_history() {
    let app = spawn_app().await;
    let token = app.register("pat").await;

    let resp = authed(app.server.post("/chat"), &token)
        .json(&json!({ "content": "SPY 어때?" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["content"], "SPY 비중을 유지하세요.");

    let history: Vec<Value> = authed(app.server.get("/chat/history"), &token).await.json();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "assistant");
    assert_eq!(history[1]["role"], "user");
    assert_eq!(history[1]["content"], "SPY 어때?");
}

#[tokio::test]
async fn prompt_replays_history_after_the_system_message() {
    let app = spawn_app().await;
    let token = app.register("quinn").await;

    for content in ["첫 질문", "두 번째 질문"] {
        authed(app.server.post("/chat"), &token)
            .json(&json!({ "content": content }))
            .await
            .assert_status_ok();
    }

    let request = app.advisor.last_request();
    let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert!(request.messages[0].content.contains("quinn 님 고객님"));
    assert_eq!(request.messages[3].content, "두 번째 질문");
    assert_eq!(request.model_type, "clova-x");
}

#[tokio::test]
async fn empty_content_is_accepted_but_missing_is_not() {
    let app = spawn_app().await;
    let token = app.register("rita").await;

    authed(app.server.post("/chat"), &token)
        .json(&json!({ "content": "" }))
        .await
        .assert_status_ok();

    let resp = authed(app.server.post("/chat"), &token).json(&json!({})).await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn advisor_failure_is_a_server_error() {
    let app = spawn_app().await;
    let token = app.register("sam").await;
    app.advisor.set_failing(true);

    let resp = authed(app.server.post("/chat"), &token)
        .json(&json!({ "content": "hello" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = resp.json::<Value>()["detail"].as_str().unwrap().to_owned();
    assert!(detail.starts_with("AI 서비스 오류: "), "{detail}");
}

#[tokio::test]
async fn stream_emits_content_frames_then_done() {
    let app = spawn_app_with_reply("분산 투자를 권합니다").await;
    let token = app.register("tina").await;

    let resp = authed(app.server.post("/chat/stream"), &token)
        .json(&json!({ "content": "추천해줘" }))
        .await;
    resp.assert_status_ok();
    let content_type = resp.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("text/event-stream"));
    assert_eq!(resp.header("cache-control"), "no-cache");

    let frames: Vec<String> = resp
        .text()
        .lines()
        .filter_map(|line| line.strip_prefix("data:").map(|d| d.trim_start().to_owned()))
        .collect();
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    let streamed: String = frames[..frames.len() - 1]
        .iter()
        .map(|f| {
            serde_json::from_str::<Value>(f).unwrap()["content"]
                .as_str()
                .unwrap()
                .to_owned()
        })
        .collect();
    assert_eq!(streamed, "분산 투자를 권합니다");

    let history: Vec<Value> = authed(app.server.get("/chat/history"), &token).await.json();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["content"], "분산 투자를 권합니다");
}

#[tokio::test]
async fn stream_reports_failures_in_band() {
    let app = spawn_app().await;
    let token = app.register("uma").await;
    app.advisor.set_failing(true);

    let resp = authed(app.server.post("/chat/stream"), &token)
        .json(&json!({ "content": "hi" }))
        .await;
    resp.assert_status_ok();
    let text = resp.text();
    assert!(text.contains("AI 서비스 오류: "), "{text}");
    assert!(text.trim_end().ends_with("[DONE]"), "{text}");
}

#[tokio::test]
async fn history_limit_and_delete() {
    let app = spawn_app().await;
    let token = app.register("vera").await;

    for i in 0..3 {
        authed(app.server.post("/chat"), &token)
            .json(&json!({ "content": format!("질문 {i}") }))
            .await
            .assert_status_ok();
    }

    let limited: Vec<Value> = authed(app.server.get("/chat/history"), &token)
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(limited.len(), 2);

    let resp = authed(app.server.get("/chat/history"), &token)
        .add_query_param("limit", 0)
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let deleted: Value = authed(app.server.delete("/chat/history"), &token).await.json();
    assert_eq!(deleted["deleted"], 6);
    let history: Vec<Value> = authed(app.server.get("/chat/history"), &token).await.json();
    assert!(history.is_empty());
}
