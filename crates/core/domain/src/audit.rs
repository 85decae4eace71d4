//! 登录审计记录（只追加）。

use serde::{Deserialize, Serialize};

/// 无法解析用户时使用的占位 user_id。
pub const UNKNOWN_USER_ID: &str = "unknown";

/// 审计动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginAction {
    Login,
    Logout,
    PasswordChange,
}

impl LoginAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginAction::Login => "login",
            LoginAction::Logout => "logout",
            LoginAction::PasswordChange => "password_change",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(LoginAction::Login),
            "logout" => Some(LoginAction::Logout),
            "password_change" => Some(LoginAction::PasswordChange),
            _ => None,
        }
    }
}

/// 登录尝试记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttempt {
    pub attempt_id: String,
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub action: LoginAction,
    pub ts_ms: i64,
}
