//! REST API tests against the full application over a real socket.

use serde_json::json;

use super::harness::{get, login, send, start_app, with_body};

#[tokio::test]
async fn health_is_public_and_enveloped() {
    let app = start_app().await;
    let reply = get(app.addr(), "/api/health", None).await;
    app.shutdown().await;

    assert_eq!(reply.status, 200);
    let body = reply.json();
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["time"].is_string());
}

#[tokio::test]
async fn admin_logs_in_and_reads_info() {
    let app = start_app().await;
    let addr = app.addr();

    let reply = with_body(
        addr,
        "POST",
        "/api/user/login",
        None,
        &json!({ "username": "admin", "password": "admin" }),
    )
    .await;
    assert_eq!(reply.status, 200, "{}", reply.body);
    let body = reply.json();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["username"], "admin");
    assert!(body["data"]["exp"].as_i64().unwrap() > 0);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let info = get(addr, "/api/user/info", Some(token.as_str())).await;
    let logout = with_body(addr, "POST", "/api/user/logout", Some(token.as_str()), &json!({})).await;
    app.shutdown().await;

    assert_eq!(info.status, 200);
    let info_body = info.json();
    let data = &info_body["data"];
    assert_eq!(data["username"], "admin");
    assert!(data.get("password").is_none(), "password hash exposed: {data}");
    assert_eq!(logout.status, 200);
    assert_eq!(logout.json()["message"], "Logout successful");
}

#[tokio::test]
async fn bad_credentials_are_401() {
    let app = start_app().await;
    let addr = app.addr();

    let wrong = with_body(
        addr,
        "POST",
        "/api/user/login",
        None,
        &json!({ "username": "admin", "password": "nope" }),
    )
    .await;
    let unknown = with_body(
        addr,
        "POST",
        "/api/user/login",
        None,
        &json!({ "username": "ghost", "password": "admin" }),
    )
    .await;
    let empty = with_body(
        addr,
        "POST",
        "/api/user/login",
        None,
        &json!({ "username": "", "password": "" }),
    )
    .await;
    app.shutdown().await;

    assert_eq!(wrong.status, 401);
    assert_eq!(unknown.status, 401);
    // Unknown users and wrong passwords are indistinguishable.
    assert_eq!(wrong.json()["message"], unknown.json()["message"]);
    assert_eq!(empty.status, 400);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = start_app().await;
    let addr = app.addr();

    let no_token = get(addr, "/api/sub/list", None).await;
    let bad_token = get(addr, "/api/sub/list", Some("not.a.jwt")).await;
    let info = get(addr, "/api/user/info", None).await;
    app.shutdown().await;

    for reply in [no_token, bad_token, info] {
        assert_eq!(reply.status, 401);
        assert_eq!(reply.json()["code"], 401);
    }
}

#[tokio::test]
async fn update_info_changes_password_and_username() {
    let app = start_app().await;
    let addr = app.addr();
    let token = login(addr, "admin", "admin").await;

    let missing_old = with_body(
        addr,
        "PUT",
        "/api/user/info",
        Some(token.as_str()),
        &json!({ "new_password": "secret123" }),
    )
    .await;
    assert_eq!(missing_old.status, 400);

    let wrong_old = with_body(
        addr,
        "PUT",
        "/api/user/info",
        Some(token.as_str()),
        &json!({ "old_password": "wrong", "new_password": "secret123" }),
    )
    .await;
    assert_eq!(wrong_old.status, 401);
    assert_eq!(wrong_old.json()["message"], "Invalid old password");

    let too_short = with_body(
        addr,
        "PUT",
        "/api/user/info",
        Some(token.as_str()),
        &json!({ "old_password": "admin", "new_password": "abc" }),
    )
    .await;
    assert_eq!(too_short.status, 400);

    let ok = with_body(
        addr,
        "PUT",
        "/api/user/info",
        Some(token.as_str()),
        &json!({ "old_password": "admin", "new_password": "secret123", "username": "root" }),
    )
    .await;
    assert_eq!(ok.status, 200, "{}", ok.body);
    assert_eq!(ok.json()["message"], "User information updated successfully");

    let token = login(addr, "root", "secret123").await;
    let info = get(addr, "/api/user/info", Some(token.as_str())).await;
    app.shutdown().await;
    assert_eq!(info.json()["data"]["username"], "root");
}

#[tokio::test]
async fn subscription_lifecycle() {
    let app = start_app().await;
    let addr = app.addr();
    let token = login(addr, "admin", "admin").await;
    let source = format!("http://{addr}/api/health");

    let created = with_body(
        addr,
        "POST",
        "/api/sub/add",
        Some(token.as_str()),
        &json!({ "url": source, "cron": "*/30 * * * *", "auto_update": true }),
    )
    .await;
    assert_eq!(created.status, 201, "{}", created.body);
    let sub = created.json()["data"].clone();
    assert_eq!(sub["url"], source);
    assert_eq!(sub["auto_update"], true);
    assert!(sub.get("last_fetch").is_none());
    let id = sub["id"].as_i64().unwrap();

    let duplicate = with_body(
        addr,
        "POST",
        "/api/sub/add",
        Some(token.as_str()),
        &json!({ "url": source, "cron": "0 * * * *", "auto_update": false }),
    )
    .await;
    assert_eq!(duplicate.status, 409);

    let bad_cron = with_body(
        addr,
        "POST",
        "/api/sub/add",
        Some(token.as_str()),
        &json!({ "url": "http://example.com/other", "cron": "61 * * * *", "auto_update": false }),
    )
    .await;
    assert_eq!(bad_cron.status, 400);

    let list = get(addr, "/api/sub/list", Some(token.as_str())).await;
    assert_eq!(list.json()["data"].as_array().unwrap().len(), 1);

    let one = get(addr, &format!("/api/sub/{id}"), Some(token.as_str())).await;
    assert_eq!(one.json()["data"]["id"], id);
    assert_eq!(get(addr, "/api/sub/abc", Some(token.as_str())).await.status, 400);
    assert_eq!(get(addr, "/api/sub/9999", Some(token.as_str())).await.status, 404);

    let updated = with_body(
        addr,
        "PUT",
        &format!("/api/sub/{id}"),
        Some(token.as_str()),
        &json!({ "cron": "0 6 * * 1-5", "auto_update": false }),
    )
    .await;
    assert_eq!(updated.status, 200, "{}", updated.body);
    assert_eq!(updated.json()["data"]["cron"], "0 6 * * 1-5");
    assert_eq!(updated.json()["data"]["auto_update"], false);
    assert_eq!(updated.json()["data"]["url"], source);

    let content = get(addr, &format!("/api/sub/{id}/content"), Some(token.as_str())).await;
    assert_eq!(content.status, 200, "{}", content.body);
    let data = content.json()["data"].clone();
    assert!(data["content"].as_str().unwrap().contains("\"status\":\"ok\""));
    assert!(data["sub"]["last_fetch"].is_string());

    let bearer = format!("Bearer {token}");
    let deleted = send(
        addr,
        "DELETE",
        &format!("/api/sub/{id}"),
        &[("Authorization", bearer.as_str())],
        None,
    )
    .await;
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.json()["message"], "Subscription deleted successfully");

    let gone = get(addr, &format!("/api/sub/{id}"), Some(token.as_str())).await;
    app.shutdown().await;
    assert_eq!(gone.status, 404);
}

#[tokio::test]
async fn unreachable_source_is_503() {
    let app = start_app().await;
    let addr = app.addr();
    let token = login(addr, "admin", "admin").await;

    let created = with_body(
        addr,
        "POST",
        "/api/sub/add",
        Some(token.as_str()),
        &json!({ "url": "http://127.0.0.1:9/sub", "cron": "0 * * * *", "auto_update": false }),
    )
    .await;
    let id = created.json()["data"]["id"].as_i64().unwrap();

    let content = get(addr, &format!("/api/sub/{id}/content"), Some(token.as_str())).await;
    app.shutdown().await;

    assert_eq!(content.status, 503);
    assert_eq!(content.json()["message"], "Failed to fetch subscription data");
}

#[tokio::test]
async fn openapi_lists_bound_routes() {
    let app = start_app().await;
    let reply = get(app.addr(), "/api/openapi.json", None).await;
    app.shutdown().await;

    assert_eq!(reply.status, 200);
    let doc = reply.json();
    assert_eq!(doc["openapi"], "3.1.0");
    assert_eq!(doc["info"]["title"], "subhub");
    assert!(doc["paths"]["/api/sub/{id}"]["delete"].is_object());
    assert_eq!(
        doc["paths"]["/api/health"]["get"]["summary"],
        "Health check endpoint"
    );
}
