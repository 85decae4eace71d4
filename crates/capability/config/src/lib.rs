//! 应用运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 身份提供方实现选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// 进程内账户表 + 本地签发的 JWT（开发/测试）
    Local,
    /// 远端 GoTrue 兼容身份服务
    Remote,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub identity_url: String,
    pub identity_anon_key: String,
    pub identity_mode: IdentityMode,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_ttl_seconds: u64,
    pub auth_timeout: Duration,
    pub auth_path: String,
    pub public_paths: Vec<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity_url = read_required("SOUK_IDENTITY_URL")?;
        let identity_anon_key = read_required("SOUK_IDENTITY_ANON_KEY")?;
        let database_url = read_optional("SOUK_DATABASE_URL");
        let identity_mode = match read_optional("SOUK_IDENTITY_MODE") {
            Some(value) => parse_identity_mode(&value)?,
            None if database_url.is_some() => IdentityMode::Remote,
            None => IdentityMode::Local,
        };
        let http_addr = env::var("SOUK_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let jwt_secret = env::var("SOUK_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let access_ttl_seconds = read_u64_with_default("SOUK_ACCESS_TTL_SECONDS", 3600)?;
        let auth_timeout_ms = read_u64_with_default("SOUK_AUTH_TIMEOUT_MS", 3000)?;
        let auth_path = env::var("SOUK_AUTH_PATH").unwrap_or_else(|_| "/login".to_string());
        let public_paths = read_list_with_default(
            "SOUK_PUBLIC_PATHS",
            &["/login", "/register", "/health", "/api/auth"],
        );

        Ok(Self {
            http_addr,
            identity_url: identity_url.trim_end_matches('/').to_string(),
            identity_anon_key,
            identity_mode,
            database_url,
            jwt_secret,
            access_ttl_seconds,
            auth_timeout: Duration::from_millis(auth_timeout_ms),
            auth_path,
            public_paths,
        })
    }
}

fn read_required(key: &str) -> Result<String, ConfigError> {
    read_optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_list_with_default(key: &str, default: &[&str]) -> Vec<String> {
    match read_optional(key) {
        Some(value) => split_list(&value),
        None => default.iter().map(|item| (*item).to_string()).collect(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_identity_mode(value: &str) -> Result<IdentityMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "local" => Ok(IdentityMode::Local),
        "remote" => Ok(IdentityMode::Remote),
        _ => Err(ConfigError::Invalid(
            "SOUK_IDENTITY_MODE".to_string(),
            value.to_string(),
        )),
    }
}
