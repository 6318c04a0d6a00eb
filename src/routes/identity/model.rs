use serde::{Deserialize, Serialize};

use crate::store::Identity;

#[derive(Debug, Deserialize)]
pub struct CheckPhoneRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct CheckPhoneResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone_number: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: Identity,
    /// 凭证过期时间（unix 秒）
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

#[derive(Debug, Serialize)]
pub struct DeleteMeResponse {}
