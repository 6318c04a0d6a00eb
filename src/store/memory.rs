//! 内存存储实现，测试套件用它跑完整的服务栈

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Identity, IdentityStore, Role, Sender, StoreResult, Ticket, TicketStatus, TicketStore};
use crate::error::AppError;

#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn create(&self, identity: Identity) -> StoreResult<Identity> {
        let mut identities = self.identities.write().unwrap();
        let duplicate = identities
            .values()
            .any(|i| i.role == identity.role && i.phone_number == identity.phone_number);
        if duplicate {
            return Err(AppError::Conflict("该账号已存在".to_string()));
        }
        identities.insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Identity>> {
        Ok(self.identities.read().unwrap().get(id).cloned())
    }

    async fn find_by_identifier(
        &self,
        role: Role,
        identifier: &str,
    ) -> StoreResult<Option<Identity>> {
        Ok(self
            .identities
            .read()
            .unwrap()
            .values()
            .find(|i| i.role == role && i.phone_number == identifier)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: &str,
        nickname: Option<String>,
        avatar_url: Option<String>,
    ) -> StoreResult<Identity> {
        let mut identities = self.identities.write().unwrap();
        let identity = identities
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("账号不存在".to_string()))?;
        if let Some(nickname) = nickname {
            identity.nickname = nickname;
        }
        if let Some(avatar_url) = avatar_url {
            identity.avatar_url = Some(avatar_url);
        }
        Ok(identity.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut identities = self.identities.write().unwrap();
        identities
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("账号不存在".to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写锁内套用领域规则，保证计数与状态的原子性
    fn mutate<F>(&self, id: &str, f: F) -> StoreResult<Ticket>
    where
        F: FnOnce(&mut Ticket) -> Result<(), AppError>,
    {
        let mut tickets = self.tickets.write().unwrap();
        let ticket = tickets
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("工单不存在".to_string()))?;
        f(ticket)?;
        Ok(ticket.clone())
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create(&self, ticket: Ticket) -> StoreResult<Ticket> {
        self.tickets
            .write()
            .unwrap()
            .insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Ticket>> {
        Ok(self.tickets.read().unwrap().get(id).cloned())
    }

    async fn list(
        &self,
        status: Option<TicketStatus>,
        participant_id: Option<&str>,
    ) -> StoreResult<Vec<Ticket>> {
        let tickets = self.tickets.read().unwrap();
        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .filter(|t| participant_id.is_none_or(|p| t.participant_id == p))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(result)
    }

    async fn append_message(&self, id: &str, sender: Sender, body: String) -> StoreResult<Ticket> {
        self.mutate(id, |t| t.append(sender, body))
    }

    async fn transition(&self, id: &str, to: TicketStatus) -> StoreResult<Ticket> {
        self.mutate(id, |t| t.transition(to))
    }

    async fn mark_viewed(&self, id: &str, viewer: Sender) -> StoreResult<Ticket> {
        self.mutate(id, |t| {
            t.mark_viewed(viewer);
            Ok(())
        })
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut tickets = self.tickets.write().unwrap();
        tickets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("工单不存在".to_string()))
    }
}
