use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::store::TicketStatus;
use crate::utils::{error_codes, error_to_api_response};

/// 全局错误分类；Conflict 与 InvalidTransition 原样上抛，绝不静默重试
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Conflict(String),
    Unauthorized(String),
    NotFound(String),
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },
    Closed,
    UpstreamUnavailable(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "validation error: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {} -> {}", from, to)
            }
            AppError::Closed => write!(f, "ticket closed"),
            AppError::UpstreamUnavailable(msg) => write!(f, "upstream unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::NotFound("记录不存在".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("唯一约束冲突".to_string())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("密码散列失败: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized("会话凭证无效或已过期".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, error_codes::CONFLICT, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            AppError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                error_codes::INVALID_TRANSITION,
                format!("工单状态不能从 {} 变更为 {}", from, to),
            ),
            AppError::Closed => (
                StatusCode::CONFLICT,
                error_codes::TICKET_CLOSED,
                "工单已关闭，无法继续回复".to_string(),
            ),
            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Sibling registry unavailable: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    error_codes::UPSTREAM_UNAVAILABLE,
                    "对端注册服务不可用，注册已拒绝".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "内部服务器错误".to_string(),
                )
            }
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}
