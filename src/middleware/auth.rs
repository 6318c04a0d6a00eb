use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, error::AppError, utils};

/// 从会话 cookie 里取出并校验凭证，把 Claims 挂进请求扩展。
/// 校验是纯签名检查，不查任何存储。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());
    let token = jar
        .get(utils::SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("缺少会话凭证".to_string()))?;

    let claims = utils::verify_token(&token, &state.config)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
