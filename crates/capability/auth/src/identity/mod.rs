//! 身份提供方契约。
//!
//! 身份提供方负责账户、口令与会话 token；应用用户（角色、零售商关联）
//! 存放在 `souk-storage` 中，两者通过同一个用户 id 关联。
//!
//! 两种实现：
//! - [`LocalIdentityProvider`]：进程内账户表 + 本地签发的 HS256 token（开发/测试）
//! - [`RemoteIdentityProvider`]：GoTrue 兼容的远端 REST 服务
//!
//! 会话状态（`get_session` / `subscribe`）是客户端视角：提供方实例持有
//! 最近一次登录得到的会话，并在变化时广播 [`AuthChangeEvent`]。
//! 服务端操作（`get_user`、`sign_out`、`update_user_password`）显式接收 token。

mod local;
mod remote;

pub use local::LocalIdentityProvider;
pub use remote::{CallbackTokens, RemoteIdentityProvider, parse_callback};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

/// 认证事件广播通道容量。
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// 身份提供方错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token invalid")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("unsupported oauth provider: {0}")]
    UnsupportedProvider(String),
    #[error("identity backend error: {0}")]
    Backend(String),
}

impl IdentityError {
    /// token 相关错误（与后端故障区分）。
    pub fn is_token_error(&self) -> bool {
        matches!(self, IdentityError::InvalidToken | IdentityError::TokenExpired)
    }
}

/// 支持的 OAuth 提供方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
    Github,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
            OAuthProvider::Github => "github",
            OAuthProvider::Apple => "apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            "github" => Ok(OAuthProvider::Github),
            "apple" => Ok(OAuthProvider::Apple),
            other => Err(IdentityError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// 身份提供方账户。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: Option<String>,
}

/// 身份提供方会话。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// 过期时间（Unix 毫秒）
    pub expires_at: i64,
    pub user: IdentityUser,
}

/// 认证状态变化事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn(IdentitySession),
    TokenRefreshed(IdentitySession),
    SignedOut,
    UserUpdated(IdentityUser),
    PasswordRecovery,
}

/// 身份提供方接口。
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 当前持有的会话
    async fn get_session(&self) -> Result<Option<IdentitySession>, IdentityError>;

    /// 订阅认证事件；Receiver 被丢弃即取消订阅
    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent>;

    /// 邮箱 + 口令换取会话
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentitySession, IdentityError>;

    /// 生成 OAuth 授权跳转地址；成功路径表现为整页跳转
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, IdentityError>;

    /// 结束 token 对应的会话
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    /// 校验 token 并返回账户
    async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError>;

    /// 以 token 对应账户的身份修改口令
    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<IdentityUser, IdentityError>;

    /// 发送找回口令邮件
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError>;
}
