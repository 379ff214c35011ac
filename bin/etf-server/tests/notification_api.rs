mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{authed, spawn_app, spawn_app_with_reply, TestApp};
use etf_server::services::scheduler::Scheduler;
use serde_json::{json, Value};

async fn send_test(app: &TestApp, token: &str) -> i64 {
    let body: Value = authed(app.server.post("/notifications/test"), token)
        .await
        .json();
    assert_eq!(body["message"], "테스트 알림이 전송되었습니다");
    body["notification_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_notification_shows_up_unread() {
    let app = spawn_app().await;
    let token = app.register("wendy").await;
    let id = send_test(&app, &token).await;

    let list: Vec<Value> = authed(app.server.get("/notifications"), &token).await.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["type"], "system");
    assert_eq!(list[0]["title"], "테스트 알림");
    assert_eq!(list[0]["is_read"], false);
    assert_eq!(list[0]["sent_via"], "app");

    let count: Value = authed(app.server.get("/notifications/count"), &token).await.json();
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn read_marks_once_and_read_all_counts() {
    let app = spawn_app().await;
    let token = app.register("xena").await;
    let first = send_test(&app, &token).await;
    send_test(&app, &token).await;
    send_test(&app, &token).await;

    let read: Value = authed(app.server.put(&format!("/notifications/{first}/read")), &token)
        .await
        .json();
    assert_eq!(read["is_read"], true);
    let read_at = read["read_at"].clone();
    assert!(read_at.is_string());

    let again: Value = authed(app.server.put(&format!("/notifications/{first}/read")), &token)
        .await
        .json();
    assert_eq!(again["read_at"], read_at);

    let all: Value = authed(app.server.put("/notifications/read-all"), &token).await.json();
    assert_eq!(all["count"], 2);
    assert_eq!(all["message"], "2개의 알림을 읽음으로 표시했습니다");

    let unread: Value = authed(app.server.get("/notifications/count"), &token).await.json();
    assert_eq!(unread["count"], 0);
    let total: Value = authed(app.server.get("/notifications/count"), &token)
        .add_query_param("unread_only", false)
        .await
        .json();
    assert_eq!(total["count"], 3);
}

#[tokio::test]
async fn listing_pages_and_filters() {
    let app = spawn_app().await;
    let token = app.register("yuri").await;
    let first = send_test(&app, &token).await;
    let second = send_test(&app, &token).await;
    let third = send_test(&app, &token).await;

    authed(app.server.put(&format!("/notifications/{third}/read")), &token)
        .await
        .assert_status_ok();

    let page: Vec<Value> = authed(app.server.get("/notifications"), &token)
        .add_query_param("skip", 1)
        .add_query_param("limit", 1)
        .await
        .json();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], second);

    let unread: Vec<Value> = authed(app.server.get("/notifications"), &token)
        .add_query_param("unread_only", true)
        .await
        .json();
    let ids: Vec<i64> = unread.iter().map(|n| n["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, [second, first]);

    for (key, value) in [("limit", 0), ("limit", 1001), ("skip", -1)] {
        let resp = authed(app.server.get("/notifications"), &token)
            .add_query_param(key, value)
            .await;
        assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY, "{key}={value}");
    }
}

#[tokio::test]
async fn foreign_notifications_are_forbidden() {
    let app = spawn_app().await;
    let owner = app.register("zack").await;
    let other = app.register("amy").await;
    let id = send_test(&app, &owner).await;

    let resp = authed(app.server.get(&format!("/notifications/{id}")), &other).await;
    assert_eq!(resp.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(resp.json::<Value>()["detail"], "다른 사용자의 알림을 조회할 수 없습니다");

    let resp = authed(app.server.put(&format!("/notifications/{id}/read")), &other).await;
    assert_eq!(resp.status_code(), StatusCode::FORBIDDEN);

    let resp = authed(app.server.delete(&format!("/notifications/{id}")), &other).await;
    assert_eq!(resp.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(resp.json::<Value>()["detail"], "다른 사용자의 알림을 삭제할 수 없습니다");

    let resp = authed(app.server.get("/notifications/9999"), &owner).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["detail"], "알림을 찾을 수 없습니다");

    let resp = authed(app.server.delete(&format!("/notifications/{id}")), &owner).await;
    assert_eq!(resp.json::<Value>()["message"], "알림이 삭제되었습니다");
    let resp = authed(app.server.get(&format!("/notifications/{id}")), &owner).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_settings_round_trip() {
    let app = spawn_app().await;
    let token = app.register("beth").await;

    let resp = authed(app.server.get("/notifications/settings"), &token).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["detail"], "알림 설정을 찾을 수 없습니다");

    authed(app.server.post("/users/me/settings"), &token)
        .json(&json!({}))
        .await
        .assert_status_ok();

    let current: Value = authed(app.server.get("/notifications/settings"), &token)
        .await
        .json();
    assert_eq!(current, json!({ "notification_enabled": true, "notification_channels": "app" }));

    let updated: Value = authed(app.server.put("/notifications/settings"), &token)
        .json(&json!({ "notification_enabled": false, "notification_channels": "app,email" }))
        .await
        .json();
    assert_eq!(updated["notification_enabled"], false);
    assert_eq!(updated["notification_channels"], "app,email");

    let resp = authed(app.server.put("/notifications/settings"), &token)
        .json(&json!({ "notification_channels": "app,pigeon" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn scheduler_run_lands_in_the_inbox() {
    let app = spawn_app_with_reply(
        "SPY 비중을 30% 조정하고 금액을 50000원으로 변경하세요. 분산 투자를 추천합니다.",
    )
    .await;
    let token = app.register_with_settings("cleo").await;
    authed(app.server.post("/portfolio"), &token)
        .json(&json!({ "etf_id": 1, "monthly_investment": 100000, "cycle": "daily" }))
        .await
        .assert_status_ok();

    let scheduler = Scheduler::new(app.state.clone());
    let summary = scheduler.run_once(Utc::now()).await;
    assert_eq!(summary.notified, 1);

    let list: Vec<Value> = authed(app.server.get("/notifications"), &token).await.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["type"], "portfolio_analysis");
    assert_eq!(list[0]["sent_via"], "app");
    assert!(list[0]["content"].as_str().unwrap().contains("SPY"));

    // Same local day: nothing new.
    let summary = scheduler.run_once(Utc::now()).await;
    assert_eq!(summary.notified, 0);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn non_numeric_id_answers_json_detail() {
    let app = spawn_app().await;
    let token = app.register("rhea").await;

    let resp = authed(app.server.put("/notifications/abc/read"), &token).await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json::<Value>()["detail"].is_string());
}
