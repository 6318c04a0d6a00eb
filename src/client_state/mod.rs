//! 调用方侧的角色会话槽
//!
//! 任意时刻最多只有一个角色在册。换角色没有原地改写的路径，
//! 必须先登出再登录；每次迁移都整体清空缓存，上一个身份拉到的
//! 服务端数据不允许泄漏进新会话。

pub mod sync;

use std::collections::HashMap;

use crate::error::AppError;
use crate::store::{Identity, Role};

/// 会话槽：匿名，或已认证的某一个角色
#[derive(Debug, Clone)]
pub enum SessionSlot {
    Anonymous,
    Authenticated { role: Role, identity: Identity },
}

/// 缓存值带上所属身份，防止跨会话串数据
#[derive(Debug, Clone)]
struct CacheEntry {
    owner_id: String,
    value: serde_json::Value,
}

pub struct ClientState {
    slot: SessionSlot,
    cache: HashMap<String, CacheEntry>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            slot: SessionSlot::Anonymous,
            cache: HashMap::new(),
        }
    }

    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.slot, SessionSlot::Authenticated { .. })
    }

    /// 只允许从匿名态登录；已认证时要换角色必须先 logout
    pub fn login(&mut self, role: Role, identity: Identity) -> Result<(), AppError> {
        match self.slot {
            SessionSlot::Anonymous => {
                self.purge();
                self.slot = SessionSlot::Authenticated { role, identity };
                Ok(())
            }
            SessionSlot::Authenticated { .. } => Err(AppError::Conflict(
                "已有活动会话，换角色必须先登出".to_string(),
            )),
        }
    }

    /// 登出：远端调用尽力而为，本地清理无条件执行。
    /// 远端失败只会留下一个等自然过期的孤儿凭证，不会卡住客户端。
    pub fn logout<E: std::fmt::Display>(&mut self, remote_result: Result<(), E>) {
        if let Err(e) = remote_result {
            tracing::warn!("Remote logout failed, purging locally anyway: {}", e);
        }
        self.slot = SessionSlot::Anonymous;
        self.purge();
    }

    /// 缓存一条服务端数据；匿名态没有归属身份，直接丢弃
    pub fn cache_put(&mut self, key: impl Into<String>, value: serde_json::Value) {
        if let SessionSlot::Authenticated { identity, .. } = &self.slot {
            self.cache.insert(
                key.into(),
                CacheEntry {
                    owner_id: identity.id.clone(),
                    value,
                },
            );
        }
    }

    /// 只命中当前身份名下的缓存
    pub fn cache_get(&self, key: &str) -> Option<&serde_json::Value> {
        let SessionSlot::Authenticated { identity, .. } = &self.slot else {
            return None;
        };
        self.cache
            .get(key)
            .filter(|e| e.owner_id == identity.id)
            .map(|e| &e.value)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn purge(&mut self) {
        self.cache.clear();
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
