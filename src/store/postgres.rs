//! Postgres 存储实现（sqlx）
//!
//! 未读计数与状态推进都压进单条 UPDATE，由 WHERE 子句把关，
//! 并发追加不会丢消息也不会错算计数。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    Identity, IdentityStore, RegistryRole, Role, Sender, StoreResult, Ticket, TicketKind,
    TicketMessage, TicketStatus, TicketStore,
};
use crate::error::AppError;

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: String,
    phone_number: String,
    password_hash: Option<String>,
    role: String,
    nickname: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self) -> StoreResult<Identity> {
        let role = Role::from_str(&self.role)
            .map_err(|_| AppError::Internal(format!("身份角色字段非法: {}", self.role)))?;
        Ok(Identity {
            id: self.id,
            phone_number: self.phone_number,
            password_hash: self.password_hash,
            role,
            nickname: self.nickname,
            avatar_url: self.avatar_url,
            created_at: self.created_at,
        })
    }
}

const IDENTITY_COLUMNS: &str =
    "id, phone_number, password_hash, role, nickname, avatar_url, created_at";

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create(&self, identity: Identity) -> StoreResult<Identity> {
        let result = sqlx::query(
            r#"
            INSERT INTO identities (id, phone_number, password_hash, role, nickname, avatar_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.phone_number)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(&identity.nickname)
        .bind(&identity.avatar_url)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(identity),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict("该账号已存在".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM identities WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRow::into_identity).transpose()
    }

    async fn find_by_identifier(
        &self,
        role: Role,
        identifier: &str,
    ) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM identities WHERE role = $1 AND phone_number = $2",
            IDENTITY_COLUMNS
        ))
        .bind(role.as_str())
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRow::into_identity).transpose()
    }

    async fn update_profile(
        &self,
        id: &str,
        nickname: Option<String>,
        avatar_url: Option<String>,
    ) -> StoreResult<Identity> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            UPDATE identities
            SET nickname = COALESCE($2, nickname),
                avatar_url = COALESCE($3, avatar_url)
            WHERE id = $1
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .bind(nickname)
        .bind(avatar_url)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("账号不存在".to_string()))?
            .into_identity()
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("账号不存在".to_string()));
        }
        Ok(())
    }
}

pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_messages(&self, ticket_id: &str) -> StoreResult<Vec<TicketMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, sender, body, sent_at FROM ticket_messages WHERE ticket_id = $1 ORDER BY sent_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn assemble(&self, row: TicketRow) -> StoreResult<Ticket> {
        let messages = self.load_messages(&row.id).await?;
        row.into_ticket(messages)
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: String,
    kind: String,
    participant_id: String,
    participant_role: String,
    status: String,
    unread_for_admin: i32,
    unread_for_user: i32,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_ticket(self, messages: Vec<TicketMessage>) -> StoreResult<Ticket> {
        let kind = TicketKind::from_str(&self.kind)
            .map_err(|_| AppError::Internal(format!("工单类型字段非法: {}", self.kind)))?;
        let participant_role = RegistryRole::from_str(&self.participant_role).map_err(|_| {
            AppError::Internal(format!("参与者角色字段非法: {}", self.participant_role))
        })?;
        let status = TicketStatus::from_str(&self.status)
            .map_err(|_| AppError::Internal(format!("工单状态字段非法: {}", self.status)))?;
        Ok(Ticket {
            id: self.id,
            kind,
            participant_id: self.participant_id,
            participant_role,
            status,
            messages,
            unread_for_admin: self.unread_for_admin,
            unread_for_user: self.unread_for_user,
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    sender: String,
    body: String,
    sent_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> StoreResult<TicketMessage> {
        let sender = Sender::from_str(&self.sender)
            .map_err(|_| AppError::Internal(format!("发言方字段非法: {}", self.sender)))?;
        Ok(TicketMessage {
            id: self.id,
            sender,
            body: self.body,
            sent_at: self.sent_at,
        })
    }
}

const TICKET_COLUMNS: &str = "id, kind, participant_id, participant_role, status, \
     unread_for_admin, unread_for_user, last_activity_at, created_at";

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn create(&self, ticket: Ticket) -> StoreResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tickets (id, kind, participant_id, participant_role, status,
                                 unread_for_admin, unread_for_user, last_activity_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&ticket.id)
        .bind(ticket.kind.as_str())
        .bind(&ticket.participant_id)
        .bind(ticket.participant_role.as_str())
        .bind(ticket.status.as_str())
        .bind(ticket.unread_for_admin)
        .bind(ticket.unread_for_user)
        .bind(ticket.last_activity_at)
        .bind(ticket.created_at)
        .execute(&mut *tx)
        .await?;

        for message in &ticket.messages {
            sqlx::query(
                "INSERT INTO ticket_messages (id, ticket_id, sender, body, sent_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&message.id)
            .bind(&ticket.id)
            .bind(message.sender.as_str())
            .bind(&message.body)
            .bind(message.sent_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(ticket)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        status: Option<TicketStatus>,
        participant_id: Option<&str>,
    ) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            SELECT {}
            FROM tickets
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR participant_id = $2)
            ORDER BY last_activity_at DESC
            "#,
            TICKET_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            tickets.push(self.assemble(row).await?);
        }
        Ok(tickets)
    }

    async fn append_message(&self, id: &str, sender: Sender, body: String) -> StoreResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        // 关闭状态由 WHERE 把关：参与者被拒，管理员可补结语
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            UPDATE tickets
            SET unread_for_admin = unread_for_admin + CASE WHEN $2 = 'user' THEN 1 ELSE 0 END,
                unread_for_user  = unread_for_user  + CASE WHEN $2 = 'admin' THEN 1 ELSE 0 END,
                status = CASE WHEN $2 = 'admin' AND status = 'open' THEN 'in_progress' ELSE status END,
                last_activity_at = NOW()
            WHERE id = $1 AND (status <> 'closed' OR $2 = 'admin')
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(id)
        .bind(sender.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                let exists =
                    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1)")
                        .bind(id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if exists {
                    AppError::Closed
                } else {
                    AppError::NotFound("工单不存在".to_string())
                });
            }
        };

        sqlx::query(
            "INSERT INTO ticket_messages (id, ticket_id, sender, body, sent_at) VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(sender.as_str())
        .bind(&body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.assemble(row).await
    }

    async fn transition(&self, id: &str, to: TicketStatus) -> StoreResult<Ticket> {
        // 合法边也写死在 WHERE 里，非法变更一行都不会改
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            UPDATE tickets
            SET status = $2, last_activity_at = NOW()
            WHERE id = $1
              AND ((status = 'open' AND $2 = 'in_progress')
                OR (status = 'in_progress' AND $2 = 'closed'))
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(id)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble(row).await,
            None => {
                let current =
                    sqlx::query_scalar::<_, String>("SELECT status FROM tickets WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                match current {
                    Some(status) => {
                        let from = TicketStatus::from_str(&status).map_err(|_| {
                            AppError::Internal(format!("工单状态字段非法: {}", status))
                        })?;
                        Err(AppError::InvalidTransition { from, to })
                    }
                    None => Err(AppError::NotFound("工单不存在".to_string())),
                }
            }
        }
    }

    async fn mark_viewed(&self, id: &str, viewer: Sender) -> StoreResult<Ticket> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            UPDATE tickets
            SET unread_for_admin = CASE WHEN $2 = 'admin' THEN 0 ELSE unread_for_admin END,
                unread_for_user  = CASE WHEN $2 = 'user' THEN 0 ELSE unread_for_user END,
                status = CASE WHEN $2 = 'admin' AND status = 'open' THEN 'in_progress' ELSE status END
            WHERE id = $1
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(id)
        .bind(viewer.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble(row).await,
            None => Err(AppError::NotFound("工单不存在".to_string())),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("工单不存在".to_string()));
        }
        Ok(())
    }
}
