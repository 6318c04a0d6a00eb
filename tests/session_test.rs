//! 登录、会话凭证与角色匹配

mod common;

use axum::http::StatusCode;
use cookie::SameSite;
use laowu_backend::{store::RegistryRole, utils::SESSION_COOKIE};
use serde_json::json;

use common::{register, registry_pair, single_server, user_session};

#[tokio::test]
async fn login_sets_hardened_session_cookie() {
    let server = single_server(RegistryRole::Client);
    register(&server, RegistryRole::Client, "9100000001")
        .await
        .assert_status_ok();

    let response = server
        .post("/identity/client/login")
        .json(&json!({ "identifier": "9100000001", "password": "secret-pass" }))
        .await;
    response.assert_status_ok();

    let cookie = response.cookie(SESSION_COOKIE);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    // 7 天 TTL
    assert_eq!(
        cookie.max_age(),
        Some(cookie::time::Duration::days(7))
    );
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = single_server(RegistryRole::Client);
    register(&server, RegistryRole::Client, "9100000002")
        .await
        .assert_status_ok();

    server
        .post("/identity/client/login")
        .json(&json!({ "identifier": "9100000002", "password": "not-the-pass" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_identifier_is_not_found() {
    let server = single_server(RegistryRole::Client);

    server
        .post("/identity/client/login")
        .json(&json!({ "identifier": "9100000003", "password": "whatever" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_credential_rejected_on_worker_endpoint() {
    let (client_server, worker_server) = registry_pair();

    // 场景D：client 凭证签名有效，但角色不匹配 worker 注册表
    let cookie = user_session(&client_server, RegistryRole::Client, "9100000004").await;

    worker_server
        .patch("/identity/worker/me")
        .add_cookie(cookie)
        .json(&json!({ "nickname": "换个昵称" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_requires_matching_role() {
    let server = single_server(RegistryRole::Worker);
    let cookie = user_session(&server, RegistryRole::Worker, "9100000005").await;

    let response = server
        .patch("/identity/worker/me")
        .add_cookie(cookie)
        .json(&json!({ "nickname": "老师傅" }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["resp_data"]["nickname"], "老师傅");
}

#[tokio::test]
async fn missing_or_tampered_credential_is_unauthorized() {
    let server = single_server(RegistryRole::Client);
    user_session(&server, RegistryRole::Client, "9100000006").await;

    // 无 cookie
    server
        .patch("/identity/client/me")
        .json(&json!({ "nickname": "匿名者" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // 伪造 cookie
    server
        .patch("/identity/client/me")
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, "not-a-jwt"))
        .json(&json!({ "nickname": "伪造者" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let server = single_server(RegistryRole::Client);
    let cookie = user_session(&server, RegistryRole::Client, "9100000007").await;

    let response = server
        .post("/identity/client/logout")
        .add_cookie(cookie)
        .await;
    response.assert_status_ok();

    // 清除即把 cookie 置成空值过期
    let cleared = response.cookie(SESSION_COOKIE);
    assert_eq!(cleared.value(), "");
}

#[tokio::test]
async fn self_service_delete_removes_identity() {
    let server = single_server(RegistryRole::Client);
    let cookie = user_session(&server, RegistryRole::Client, "9100000008").await;

    server
        .delete("/identity/client/me")
        .add_cookie(cookie)
        .await
        .assert_status_ok();

    // 注销后登录不到了
    server
        .post("/identity/client/login")
        .json(&json!({ "identifier": "9100000008", "password": "secret-pass" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nickname_length_is_validated() {
    let server = single_server(RegistryRole::Client);
    let cookie = user_session(&server, RegistryRole::Client, "9100000009").await;

    server
        .patch("/identity/client/me")
        .add_cookie(cookie)
        .json(&json!({ "nickname": "短" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
