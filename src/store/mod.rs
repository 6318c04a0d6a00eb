pub mod memory;
pub mod models;
pub mod postgres;

pub use models::*;

use async_trait::async_trait;

use crate::error::AppError;

pub type StoreResult<T> = Result<T, AppError>;

/// 身份存储：每个实例独占自己的身份分区
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// (role, phone_number) 重复时返回 Conflict
    async fn create(&self, identity: Identity) -> StoreResult<Identity>;

    async fn get(&self, id: &str) -> StoreResult<Option<Identity>>;

    /// 按角色分区查找；client/worker 用手机号，admin 用用户名
    async fn find_by_identifier(&self, role: Role, identifier: &str)
    -> StoreResult<Option<Identity>>;

    async fn update_profile(
        &self,
        id: &str,
        nickname: Option<String>,
        avatar_url: Option<String>,
    ) -> StoreResult<Identity>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// 工单存储：计数器与状态变更必须是存储层的原子更新，
/// 不能拿客户端算好的值回写
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, ticket: Ticket) -> StoreResult<Ticket>;

    async fn get(&self, id: &str) -> StoreResult<Option<Ticket>>;

    /// 全量拉取，按最近活动倒序；轮询端靠它刷新视图
    async fn list(
        &self,
        status: Option<TicketStatus>,
        participant_id: Option<&str>,
    ) -> StoreResult<Vec<Ticket>>;

    async fn append_message(&self, id: &str, sender: Sender, body: String) -> StoreResult<Ticket>;

    async fn transition(&self, id: &str, to: TicketStatus) -> StoreResult<Ticket>;

    async fn mark_viewed(&self, id: &str, viewer: Sender) -> StoreResult<Ticket>;

    /// 仅管理员可删，删除即终态
    async fn delete(&self, id: &str) -> StoreResult<()>;
}
