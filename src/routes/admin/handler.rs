use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use super::model::{AdminLoginRequest, AdminRegisterRequest};
use crate::{
    AppState,
    error::AppError,
    routes::identity::SessionResponse,
    store::{Identity, Role},
    utils::{self, ApiResponse, generate_token, success_to_api_response, verify_password},
};

/// 管理员不走手机号注册表，由特权口令开通
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<AdminRegisterRequest>,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), AppError> {
    if state.config.admin_setup_code.is_empty() {
        return Err(AppError::Unauthorized("管理员注册入口未开放".to_string()));
    }
    if req.setup_code != state.config.admin_setup_code {
        return Err(AppError::Unauthorized("特权口令不正确".to_string()));
    }
    if req.username.len() < 3
        || !req.username.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "用户名格式无效，只允许使用字母、数字和下划线".to_string(),
        ));
    }
    if req.password.len() < 6 || req.password.len() > 24 {
        return Err(AppError::Validation(
            "密码长度必须在6到24个字符之间".to_string(),
        ));
    }

    let password_hash = utils::hash_password(&req.password)?;
    let identity = Identity {
        id: Uuid::new_v4().to_string(),
        phone_number: req.username.clone(),
        password_hash: Some(password_hash),
        role: Role::Admin,
        nickname: req.username,
        avatar_url: None,
        created_at: Utc::now(),
    };
    let identity = state.identities.create(identity).await?;

    let (token, expires_at) = generate_token(&identity.id, Role::Admin, &state.config)
        .map_err(|e| AppError::Internal(format!("生成令牌失败: {}", e)))?;

    tracing::info!("Registered admin {}", identity.id);

    let jar = jar.add(utils::session_cookie(token, &state.config));
    Ok((
        jar,
        success_to_api_response(SessionResponse {
            identity,
            expires_at,
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<AdminLoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), AppError> {
    let identity = state
        .identities
        .find_by_identifier(Role::Admin, &req.username)
        .await?
        .ok_or_else(|| AppError::NotFound("账号不存在".to_string()))?;

    let hash = identity
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("密码错误".to_string()))?;
    if !verify_password(&req.password, hash)? {
        return Err(AppError::Unauthorized("密码错误".to_string()));
    }

    let (token, expires_at) = generate_token(&identity.id, Role::Admin, &state.config)
        .map_err(|e| AppError::Internal(format!("生成令牌失败: {}", e)))?;

    let jar = jar.add(utils::session_cookie(token, &state.config));
    Ok((
        jar,
        success_to_api_response(SessionResponse {
            identity,
            expires_at,
        }),
    ))
}
