use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// 会话可携带的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Worker,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Worker => "worker",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "worker" => Ok(Role::Worker),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// 按手机号键入的注册表只有两类，管理员走单独的特权通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryRole {
    Client,
    Worker,
}

impl RegistryRole {
    pub fn as_role(&self) -> Role {
        match self {
            RegistryRole::Client => Role::Client,
            RegistryRole::Worker => Role::Worker,
        }
    }

    /// 对端注册表
    pub fn sibling(&self) -> RegistryRole {
        match self {
            RegistryRole::Client => RegistryRole::Worker,
            RegistryRole::Worker => RegistryRole::Client,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryRole::Client => "client",
            RegistryRole::Worker => "worker",
        }
    }
}

impl std::fmt::Display for RegistryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RegistryRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(RegistryRole::Client),
            "worker" => Ok(RegistryRole::Worker),
            _ => Err(()),
        }
    }
}

/// 账号身份；管理员的 phone_number 字段存用户名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub phone_number: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 工单里的发言方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Admin,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "admin" => Ok(Sender::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Feedback,
    Chat,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::Feedback => "feedback",
            TicketKind::Chat => "chat",
        }
    }
}

impl std::str::FromStr for TicketKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(TicketKind::Feedback),
            "chat" => Ok(TicketKind::Chat),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }

    /// 状态只许前进：open → in_progress → closed，closed 不可离开
    pub fn allows_transition(&self, to: TicketStatus) -> bool {
        matches!(
            (self, to),
            (TicketStatus::Open, TicketStatus::InProgress)
                | (TicketStatus::InProgress, TicketStatus::Closed)
        )
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: String,
    pub sender: Sender,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// 支持工单（意见反馈或在线聊天），带生命周期状态和双方未读计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub kind: TicketKind,
    pub participant_id: String,
    pub participant_role: RegistryRole,
    pub status: TicketStatus,
    pub messages: Vec<TicketMessage>,
    pub unread_for_admin: i32,
    pub unread_for_user: i32,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// 首条消息创建工单，发起人必然是参与者本人
    pub fn new(
        kind: TicketKind,
        participant_id: String,
        participant_role: RegistryRole,
        first_body: String,
    ) -> Self {
        let now = Utc::now();
        let mut ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            kind,
            participant_id,
            participant_role,
            status: TicketStatus::Open,
            messages: Vec::new(),
            unread_for_admin: 0,
            unread_for_user: 0,
            last_activity_at: now,
            created_at: now,
        };
        ticket.push_message(Sender::User, first_body, now);
        ticket
    }

    /// 已关闭的工单拒绝参与者继续发言；管理员仍可补一条结语
    pub fn can_append(&self, sender: Sender) -> Result<(), AppError> {
        if self.status == TicketStatus::Closed && sender == Sender::User {
            return Err(AppError::Closed);
        }
        Ok(())
    }

    fn push_message(&mut self, sender: Sender, body: String, now: DateTime<Utc>) {
        self.messages.push(TicketMessage {
            id: Uuid::new_v4().to_string(),
            sender,
            body,
            sent_at: now,
        });
        // 发言只增加对方的未读数，自己的计数不动
        match sender {
            Sender::User => self.unread_for_admin += 1,
            Sender::Admin => self.unread_for_user += 1,
        }
        self.last_activity_at = now;
    }

    pub fn append(&mut self, sender: Sender, body: String) -> Result<(), AppError> {
        self.can_append(sender)?;
        // 管理员首次回复把工单从 open 推进到 in_progress
        if sender == Sender::Admin && self.status == TicketStatus::Open {
            self.status = TicketStatus::InProgress;
        }
        self.push_message(sender, body, Utc::now());
        Ok(())
    }

    pub fn transition(&mut self, to: TicketStatus) -> Result<(), AppError> {
        if !self.status.allows_transition(to) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.last_activity_at = Utc::now();
        Ok(())
    }

    /// 查看只清零查看方自己的计数；管理员首次查看还会认领工单
    pub fn mark_viewed(&mut self, viewer: Sender) {
        match viewer {
            Sender::Admin => {
                self.unread_for_admin = 0;
                if self.status == TicketStatus::Open {
                    self.status = TicketStatus::InProgress;
                }
            }
            Sender::User => self.unread_for_user = 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        Ticket::new(
            TicketKind::Chat,
            "u-1".to_string(),
            RegistryRole::Client,
            "你好，我的订单有问题".to_string(),
        )
    }

    #[test]
    fn new_ticket_starts_open_with_one_unread_for_admin() {
        let t = sample_ticket();
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.messages.len(), 1);
        assert_eq!(t.unread_for_admin, 1);
        assert_eq!(t.unread_for_user, 0);
    }

    #[test]
    fn append_increments_only_other_party_counter() {
        let mut t = sample_ticket();
        t.append(Sender::User, "补充一下".into()).unwrap();
        assert_eq!(t.unread_for_admin, 2);
        assert_eq!(t.unread_for_user, 0);

        t.append(Sender::Admin, "收到".into()).unwrap();
        assert_eq!(t.unread_for_admin, 2);
        assert_eq!(t.unread_for_user, 1);
    }

    #[test]
    fn first_admin_reply_moves_open_to_in_progress() {
        let mut t = sample_ticket();
        t.append(Sender::Admin, "在处理了".into()).unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
    }

    #[test]
    fn admin_view_claims_ticket_and_resets_own_counter() {
        let mut t = sample_ticket();
        t.append(Sender::User, "在吗".into()).unwrap();
        assert_eq!(t.unread_for_admin, 2);

        t.mark_viewed(Sender::Admin);
        assert_eq!(t.status, TicketStatus::InProgress);
        assert_eq!(t.unread_for_admin, 0);
        assert_eq!(t.unread_for_user, 0);
    }

    #[test]
    fn user_view_resets_only_user_counter() {
        let mut t = sample_ticket();
        t.append(Sender::Admin, "处理中".into()).unwrap();
        assert_eq!(t.unread_for_user, 1);

        t.mark_viewed(Sender::User);
        assert_eq!(t.unread_for_user, 0);
        // 对方的未读数不受影响
        assert_eq!(t.unread_for_admin, 1);
    }

    #[test]
    fn closed_is_absorbing() {
        let mut t = sample_ticket();
        t.transition(TicketStatus::InProgress).unwrap();
        t.transition(TicketStatus::Closed).unwrap();

        assert!(matches!(
            t.transition(TicketStatus::Open),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            t.transition(TicketStatus::InProgress),
            Err(AppError::InvalidTransition { .. })
        ));
        assert_eq!(t.status, TicketStatus::Closed);
    }

    #[test]
    fn open_cannot_jump_straight_to_closed() {
        let mut t = sample_ticket();
        assert!(matches!(
            t.transition(TicketStatus::Closed),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn closed_ticket_rejects_user_append_but_allows_admin_note() {
        let mut t = sample_ticket();
        t.transition(TicketStatus::InProgress).unwrap();
        t.transition(TicketStatus::Closed).unwrap();
        let before = t.messages.len();

        assert!(matches!(
            t.append(Sender::User, "还在吗".into()),
            Err(AppError::Closed)
        ));
        assert_eq!(t.messages.len(), before);

        t.append(Sender::Admin, "已按规则关闭".into()).unwrap();
        assert_eq!(t.messages.len(), before + 1);
        assert_eq!(t.status, TicketStatus::Closed);
    }

    #[test]
    fn ticket_serde_round_trip_preserves_message_order() {
        let mut t = sample_ticket();
        for i in 0..5 {
            t.append(Sender::User, format!("消息{}", i)).unwrap();
        }
        let json = serde_json::to_string(&t).unwrap();
        let back: Ticket = serde_json::from_str(&json).unwrap();

        assert_eq!(back.messages.len(), t.messages.len());
        let bodies: Vec<_> = back.messages.iter().map(|m| m.body.as_str()).collect();
        let expected: Vec<_> = t.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, expected);
        assert_eq!(back.unread_for_admin, t.unread_for_admin);
    }
}
