use std::env;
use std::time::Duration;

use crate::store::RegistryRole;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub session_ttl_secs: u64,
    /// 本实例承载的注册表角色
    pub registry_role: RegistryRole,
    /// 对端注册表实例的基地址
    pub sibling_base_url: String,
    pub sibling_timeout_secs: u64,
    /// 管理员注册的特权口令，留空则关闭该入口
    pub admin_setup_code: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // 会话有效期按小时配置，默认 7 天
        let session_ttl = env::var("SESSION_TTL")
            .unwrap_or_else(|_| "168h".into())
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(168);
        // 非法的角色值按缺失处理
        let registry_role = env::var("REGISTRY_ROLE")?
            .parse::<RegistryRole>()
            .map_err(|_| env::VarError::NotPresent)?;

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            session_ttl_secs: session_ttl * 3600,
            registry_role,
            sibling_base_url: env::var("SIBLING_BASE_URL")?,
            sibling_timeout_secs: env::var("SIBLING_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            admin_setup_code: env::var("ADMIN_SETUP_CODE").unwrap_or_default(),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")?.parse().unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")?.parse().unwrap_or(100),
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
        })
    }

    /// 测试用配置，不读环境变量
    pub fn for_tests() -> Self {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            session_ttl_secs: 7 * 24 * 3600,
            registry_role: RegistryRole::Client,
            sibling_base_url: "http://localhost:0".to_string(),
            sibling_timeout_secs: 5,
            admin_setup_code: "test-setup-code".to_string(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            api_base_uri: "/api".to_string(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// 对端存在性检查的调用超时，超时即视为失败
    pub fn sibling_timeout(&self) -> Duration {
        Duration::from_secs(self.sibling_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
