//! 集成测试公共设施：两个互为对端的内存实例 + 可控的对端探针
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use laowu_backend::{
    AppState,
    config::Config,
    error::AppError,
    registry::SiblingRegistry,
    routes,
    store::{
        IdentityStore, RegistryRole, Role,
        memory::{InMemoryIdentityStore, InMemoryTicketStore},
    },
    utils::{ApiResponse, SESSION_COOKIE},
};
use serde_json::json;

/// 直接探对端实例的内存库，模拟跨实例的 check-phone 调用
pub struct StoreSiblingProbe {
    store: Arc<InMemoryIdentityStore>,
    role: Role,
}

#[async_trait]
impl SiblingRegistry for StoreSiblingProbe {
    async fn phone_exists(&self, phone_number: &str) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_by_identifier(self.role, phone_number)
            .await?
            .is_some())
    }
}

/// 对端不可用：任何查询都失败，注册必须被拒
pub struct DownSiblingProbe;

#[async_trait]
impl SiblingRegistry for DownSiblingProbe {
    async fn phone_exists(&self, _phone_number: &str) -> Result<bool, AppError> {
        Err(AppError::UpstreamUnavailable("connection timed out".to_string()))
    }
}

pub fn make_server(
    role: RegistryRole,
    identities: Arc<InMemoryIdentityStore>,
    sibling: Arc<dyn SiblingRegistry>,
) -> TestServer {
    let mut config = Config::for_tests();
    config.registry_role = role;
    let state = AppState {
        identities,
        tickets: Arc::new(InMemoryTicketStore::new()),
        sibling,
        config,
    };
    TestServer::new(routes::create_router(state)).expect("Failed to create test server")
}

/// 客户端实例和工人实例，各自的探针指向对方的身份库
pub fn registry_pair() -> (TestServer, TestServer) {
    let client_ids = Arc::new(InMemoryIdentityStore::new());
    let worker_ids = Arc::new(InMemoryIdentityStore::new());

    let client_server = make_server(
        RegistryRole::Client,
        client_ids.clone(),
        Arc::new(StoreSiblingProbe {
            store: worker_ids.clone(),
            role: Role::Worker,
        }),
    );
    let worker_server = make_server(
        RegistryRole::Worker,
        worker_ids,
        Arc::new(StoreSiblingProbe {
            store: client_ids,
            role: Role::Client,
        }),
    );

    (client_server, worker_server)
}

/// 单实例即可的测试用这个：对端是一个空库
pub fn single_server(role: RegistryRole) -> TestServer {
    let sibling_ids = Arc::new(InMemoryIdentityStore::new());
    make_server(
        role,
        Arc::new(InMemoryIdentityStore::new()),
        Arc::new(StoreSiblingProbe {
            store: sibling_ids,
            role: role.sibling().as_role(),
        }),
    )
}

pub async fn register(
    server: &TestServer,
    registry: RegistryRole,
    phone: &str,
) -> axum_test::TestResponse {
    server
        .post(&format!("/identity/{}/register", registry))
        .json(&json!({
            "phone_number": phone,
            "password": "secret-pass",
            "nickname": "测试用户",
        }))
        .await
}

/// 注册并返回会话 cookie
pub async fn user_session(
    server: &TestServer,
    registry: RegistryRole,
    phone: &str,
) -> cookie::Cookie<'static> {
    let response = register(server, registry, phone).await;
    response.assert_status_ok();
    response.cookie(SESSION_COOKIE)
}

/// 开通管理员并返回会话 cookie
pub async fn admin_session(server: &TestServer) -> cookie::Cookie<'static> {
    let response = server
        .post("/admin/register")
        .json(&json!({
            "username": "admin_001",
            "password": "admin-pass",
            "setup_code": "test-setup-code",
        }))
        .await;
    response.assert_status_ok();
    response.cookie(SESSION_COOKIE)
}

/// 从响应信封里取出业务数据
pub fn data_of<T: serde::de::DeserializeOwned>(response: &axum_test::TestResponse) -> T {
    let envelope: ApiResponse<T> = response.json();
    envelope.resp_data.expect("resp_data missing")
}
