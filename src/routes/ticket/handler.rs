use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};

use super::model::{
    AppendMessageRequest, CreateTicketRequest, DeleteTicketResponse, ListTicketsQuery,
    TransitionRequest,
};
use crate::{
    AppState,
    error::AppError,
    store::{RegistryRole, Role, Sender, Ticket},
    utils::{ApiResponse, Claims, success_to_api_response},
};

/// 发言方由会话角色推导，绝不信任请求体里的声明
fn sender_of(claims: &Claims) -> Sender {
    match claims.role {
        Role::Admin => Sender::Admin,
        Role::Client | Role::Worker => Sender::User,
    }
}

fn validate_body(body: &str) -> Result<(), AppError> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("消息内容不能为空".to_string()));
    }
    if body.chars().count() > 2000 {
        return Err(AppError::Validation("消息内容过长".to_string()));
    }
    Ok(())
}

/// 取工单并做访问控制：参与者只能看自己的，管理员全量可见。
/// 无权访问按 NotFound 处理，不向外泄露工单是否存在。
async fn authorized_ticket(
    state: &AppState,
    claims: &Claims,
    id: &str,
) -> Result<Ticket, AppError> {
    let ticket = state
        .tickets
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("工单不存在".to_string()))?;
    if claims.role != Role::Admin && ticket.participant_id != claims.sub {
        return Err(AppError::NotFound("工单不存在".to_string()));
    }
    Ok(ticket)
}

/// 首条反馈或首条聊天消息创建工单
#[axum::debug_handler]
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    let participant_role = match claims.role {
        Role::Client => RegistryRole::Client,
        Role::Worker => RegistryRole::Worker,
        Role::Admin => {
            return Err(AppError::Unauthorized("管理员不能发起工单".to_string()));
        }
    };
    validate_body(&req.body)?;

    let ticket = Ticket::new(req.kind, claims.sub.clone(), participant_role, req.body);
    let ticket = state.tickets.create(ticket).await?;

    tracing::info!("Created {} ticket {}", ticket.kind.as_str(), ticket.id);
    Ok(success_to_api_response(ticket))
}

/// 轮询入口：视图打开和每次本地变更之后都整单拉取
#[axum::debug_handler]
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<ApiResponse<Vec<Ticket>>>, AppError> {
    let tickets = match claims.role {
        Role::Admin => state.tickets.list(query.status, None).await?,
        Role::Client | Role::Worker => {
            state.tickets.list(query.status, Some(&claims.sub)).await?
        }
    };
    Ok(success_to_api_response(tickets))
}

#[axum::debug_handler]
pub async fn get_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    let ticket = authorized_ticket(&state, &claims, &id).await?;
    Ok(success_to_api_response(ticket))
}

#[axum::debug_handler]
pub async fn append_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    validate_body(&req.body)?;
    authorized_ticket(&state, &claims, &id).await?;

    let ticket = state
        .tickets
        .append_message(&id, sender_of(&claims), req.body)
        .await?;
    Ok(success_to_api_response(ticket))
}

/// 显式状态推进，只有管理员可以操作；非法边原样报错
#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    if claims.role != Role::Admin {
        return Err(AppError::Unauthorized("仅管理员可变更工单状态".to_string()));
    }

    let ticket = state.tickets.transition(&id, req.status).await?;
    tracing::info!("Ticket {} transitioned to {}", ticket.id, ticket.status);
    Ok(success_to_api_response(ticket))
}

/// 查看回执：只清零查看方自己的未读数
#[axum::debug_handler]
pub async fn mark_viewed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Ticket>>, AppError> {
    authorized_ticket(&state, &claims, &id).await?;

    let ticket = state.tickets.mark_viewed(&id, sender_of(&claims)).await?;
    Ok(success_to_api_response(ticket))
}

#[axum::debug_handler]
pub async fn delete_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeleteTicketResponse>>, AppError> {
    if claims.role != Role::Admin {
        return Err(AppError::Unauthorized("仅管理员可删除工单".to_string()));
    }

    state.tickets.delete(&id).await?;
    tracing::info!("Ticket {} deleted", id);
    Ok(success_to_api_response(DeleteTicketResponse {}))
}
