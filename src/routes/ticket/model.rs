use serde::{Deserialize, Serialize};

use crate::store::{TicketKind, TicketStatus};

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub kind: TicketKind,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    /// 按状态页签过滤；缺省拉全量
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
pub struct DeleteTicketResponse {}
