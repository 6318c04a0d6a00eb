//! 注册与跨注册表唯一性

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use laowu_backend::store::{Identity, RegistryRole, memory::InMemoryIdentityStore};
use serde_json::json;

use common::{DownSiblingProbe, data_of, make_server, register, registry_pair, single_server};

#[derive(serde::Deserialize)]
struct CheckPhone {
    exists: bool,
}

#[tokio::test]
async fn register_then_sibling_role_conflicts() {
    let (client_server, worker_server) = registry_pair();

    // 场景A：先以 client 注册
    let response = register(&client_server, RegistryRole::Client, "9000000001").await;
    response.assert_status_ok();

    // 同号换角色注册必须 409
    let response = register(&worker_server, RegistryRole::Worker, "9000000001").await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn conflict_is_symmetric() {
    let (client_server, worker_server) = registry_pair();

    register(&worker_server, RegistryRole::Worker, "9000000002")
        .await
        .assert_status_ok();
    register(&client_server, RegistryRole::Client, "9000000002")
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_in_same_registry_conflicts() {
    let (client_server, _) = registry_pair();

    register(&client_server, RegistryRole::Client, "9000000003")
        .await
        .assert_status_ok();
    register(&client_server, RegistryRole::Client, "9000000003")
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_phone_is_rejected() {
    let server = single_server(RegistryRole::Client);

    for phone in ["", "12345", "13800a38000", "+8613800000000"] {
        register(&server, RegistryRole::Client, phone)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn sibling_outage_fails_closed() {
    let identities = Arc::new(InMemoryIdentityStore::new());
    let server = make_server(
        RegistryRole::Client,
        identities,
        Arc::new(DownSiblingProbe),
    );

    let response = register(&server, RegistryRole::Client, "9000000004").await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    // 注册被拒后不能留下半个身份
    let response = server
        .post("/identity/client/check-phone")
        .json(&json!({ "phone_number": "9000000004" }))
        .await;
    response.assert_status_ok();
    assert!(!data_of::<CheckPhone>(&response).exists);
}

#[tokio::test]
async fn check_phone_reports_existing_identity() {
    let server = single_server(RegistryRole::Worker);

    register(&server, RegistryRole::Worker, "9000000005")
        .await
        .assert_status_ok();

    let response = server
        .post("/identity/worker/check-phone")
        .json(&json!({ "phone_number": "9000000005" }))
        .await;
    response.assert_status_ok();
    assert!(data_of::<CheckPhone>(&response).exists);

    let response = server
        .post("/identity/worker/check-phone")
        .json(&json!({ "phone_number": "9000000099" }))
        .await;
    assert!(!data_of::<CheckPhone>(&response).exists);
}

#[tokio::test]
async fn foreign_registry_path_is_not_served() {
    let server = single_server(RegistryRole::Client);

    // 本实例只承载 client 注册表
    register(&server, RegistryRole::Worker, "9000000006")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_returns_sanitized_identity() {
    let server = single_server(RegistryRole::Client);

    let response = register(&server, RegistryRole::Client, "9000000007").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let identity = &body["resp_data"]["identity"];
    assert_eq!(identity["phone_number"], "9000000007");
    assert_eq!(identity["role"], "client");
    // 散列绝不能出现在响应里
    assert!(identity.get("password_hash").is_none());

    let parsed: Identity = serde_json::from_value(identity.clone()).unwrap();
    assert!(parsed.password_hash.is_none());
}
