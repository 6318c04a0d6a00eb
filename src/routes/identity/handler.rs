use axum::{
    Json,
    extract::{Extension, Path, State},
};
use axum_extra::extract::cookie::CookieJar;

use super::model::{
    CheckPhoneRequest, CheckPhoneResponse, DeleteMeResponse, LoginRequest, LogoutResponse,
    RegisterRequest, SessionResponse, UpdateMeRequest,
};
use crate::{
    AppState,
    error::AppError,
    store::RegistryRole,
    utils::{
        self, ApiResponse, Claims, generate_token, is_valid_phone, success_to_api_response,
        verify_password,
    },
};

/// 每个实例只承载一个注册表；打到另一个注册表路径的请求一律 NotFound
fn ensure_home(state: &AppState, registry: RegistryRole) -> Result<(), AppError> {
    if registry != state.config.registry_role {
        return Err(AppError::NotFound("该注册表不由本实例提供".to_string()));
    }
    Ok(())
}

fn validate_nickname(nickname: &str) -> Result<(), AppError> {
    if nickname.chars().count() < 2 || nickname.chars().count() > 24 {
        return Err(AppError::Validation(
            "昵称长度必须在2到24个字符之间".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 6 || password.len() > 24 {
        return Err(AppError::Validation(
            "密码长度必须在6到24个字符之间".to_string(),
        ));
    }
    Ok(())
}

/// 对端注册表在注册流程里同步调用这个接口
#[axum::debug_handler]
pub async fn check_phone(
    State(state): State<AppState>,
    Path(registry): Path<RegistryRole>,
    Json(req): Json<CheckPhoneRequest>,
) -> Result<Json<ApiResponse<CheckPhoneResponse>>, AppError> {
    ensure_home(&state, registry)?;
    if !is_valid_phone(&req.phone_number) {
        return Err(AppError::Validation("手机号格式无效".to_string()));
    }

    let exists = state
        .identities
        .find_by_identifier(registry.as_role(), &req.phone_number)
        .await?
        .is_some();

    Ok(success_to_api_response(CheckPhoneResponse { exists }))
}

/// 注册即登录：守卫通过后直接签发会话凭证
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Path(registry): Path<RegistryRole>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), AppError> {
    ensure_home(&state, registry)?;
    validate_nickname(&req.nickname)?;
    validate_password(&req.password)?;

    let identity = state
        .guard()
        .register(&req.phone_number, &req.password, req.nickname)
        .await?;

    let (token, expires_at) = generate_token(&identity.id, identity.role, &state.config)
        .map_err(|e| AppError::Internal(format!("生成令牌失败: {}", e)))?;

    tracing::info!("Registered {} identity {}", identity.role, identity.id);

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
    Path(registry): Path<RegistryRole>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), AppError> {
    ensure_home(&state, registry)?;

    let identity = state
        .identities
        .find_by_identifier(registry.as_role(), &req.identifier)
        .await?
        .ok_or_else(|| AppError::NotFound("账号不存在".to_string()))?;

    let hash = identity
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("密码错误".to_string()))?;
    if !verify_password(&req.password, hash)? {
        return Err(AppError::Unauthorized("密码错误".to_string()));
    }

    let (token, expires_at) = generate_token(&identity.id, identity.role, &state.config)
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

/// 凭证是无状态的，服务端没有可吊销的会话；登出只负责清 cookie，
/// 调用方无论本次请求成败都要做本地清理
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Path(registry): Path<RegistryRole>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<LogoutResponse>>), AppError> {
    ensure_home(&state, registry)?;
    let jar = jar.remove(utils::removal_session_cookie());
    Ok((jar, success_to_api_response(LogoutResponse {})))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Path(registry): Path<RegistryRole>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<ApiResponse<crate::store::Identity>>, AppError> {
    ensure_home(&state, registry)?;
    // 会话角色必须与注册表一致，签名有效也不放行
    if claims.role != registry.as_role() {
        return Err(AppError::Unauthorized(
            "会话角色与注册表不匹配".to_string(),
        ));
    }
    if let Some(nickname) = &req.nickname {
        validate_nickname(nickname)?;
    }

    let identity = state
        .identities
        .update_profile(&claims.sub, req.nickname, req.avatar_url)
        .await?;

    Ok(success_to_api_response(identity))
}

/// 自助注销
#[axum::debug_handler]
pub async fn delete_me(
    State(state): State<AppState>,
    Path(registry): Path<RegistryRole>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<DeleteMeResponse>>), AppError> {
    ensure_home(&state, registry)?;
    if claims.role != registry.as_role() {
        return Err(AppError::Unauthorized(
            "会话角色与注册表不匹配".to_string(),
        ));
    }

    state.identities.delete(&claims.sub).await?;
    tracing::info!("Deleted {} identity {}", claims.role, claims.sub);

    let jar = jar.remove(utils::removal_session_cookie());
    Ok((jar, success_to_api_response(DeleteMeResponse {})))
}
