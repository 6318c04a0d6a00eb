//! 跨注册表唯一性保障
//!
//! 两个注册表各自独库，没有共享事务。注册前先查本库，再同步探一次
//! 对端；对端查询失败一律拒绝注册（fail-closed），因为身份一旦落库
//! 没有回滚手段。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{Identity, IdentityStore, RegistryRole};
use crate::utils::{self, ApiResponse};

/// 对端注册表的存在性探针
#[async_trait]
pub trait SiblingRegistry: Send + Sync {
    async fn phone_exists(&self, phone_number: &str) -> Result<bool, AppError>;
}

#[derive(serde::Deserialize)]
struct CheckPhoneData {
    exists: bool,
}

/// 生产实现：带超时的 HTTP 调用，打到对端实例的 check-phone 接口
pub struct HttpSiblingRegistry {
    client: reqwest::Client,
    base_url: String,
    sibling_role: RegistryRole,
}

impl HttpSiblingRegistry {
    pub fn new(
        base_url: String,
        sibling_role: RegistryRole,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("构建 HTTP 客户端失败: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            sibling_role,
        })
    }
}

#[async_trait]
impl SiblingRegistry for HttpSiblingRegistry {
    async fn phone_exists(&self, phone_number: &str) -> Result<bool, AppError> {
        let url = format!(
            "{}/identity/{}/check-phone",
            self.base_url.trim_end_matches('/'),
            self.sibling_role
        );
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "phone_number": phone_number }))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "对端返回 {}",
                response.status()
            )));
        }

        let body: ApiResponse<CheckPhoneData> = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        match body.resp_data {
            Some(data) => Ok(data.exists),
            None => Err(AppError::UpstreamUnavailable("对端响应缺少数据".to_string())),
        }
    }
}

/// 注册入口：本库查重 → 对端查重 → 散列口令 → 落库
pub struct UniquenessGuard {
    home: Arc<dyn IdentityStore>,
    sibling: Arc<dyn SiblingRegistry>,
    role: RegistryRole,
}

impl UniquenessGuard {
    pub fn new(
        home: Arc<dyn IdentityStore>,
        sibling: Arc<dyn SiblingRegistry>,
        role: RegistryRole,
    ) -> Self {
        Self {
            home,
            sibling,
            role,
        }
    }

    pub async fn register(
        &self,
        phone_number: &str,
        password: &str,
        nickname: String,
    ) -> Result<Identity, AppError> {
        if !utils::is_valid_phone(phone_number) {
            return Err(AppError::Validation("手机号格式无效".to_string()));
        }

        if self
            .home
            .find_by_identifier(self.role.as_role(), phone_number)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("该手机号已注册".to_string()));
        }

        // 对端查询失败时 `?` 直接把 UpstreamUnavailable 抛出去，注册终止
        if self.sibling.phone_exists(phone_number).await? {
            return Err(AppError::Conflict(
                "该手机号已在另一角色下注册".to_string(),
            ));
        }

        let password_hash = utils::hash_password(password)?;
        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            phone_number: phone_number.to_string(),
            password_hash: Some(password_hash),
            role: self.role.as_role(),
            nickname,
            avatar_url: None,
            created_at: Utc::now(),
        };

        // 两个实例同时注册同一号码仍有先检后写的窗口，这里不做跨库仲裁；
        // 本库的唯一索引只兜底同库重复
        self.home.create(identity).await
    }
}
