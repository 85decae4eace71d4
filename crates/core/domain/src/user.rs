//! 应用用户模型与角色。
//!
//! 应用用户（AppUser）是业务侧的用户记录（角色、零售商关联、语言偏好），
//! 与身份提供方自己的账户记录相互独立，通过同一个 id 关联。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 用户角色（封闭集合）。
///
/// 当前只有 admin / retailer 两种角色被门户实际使用，
/// driver 可以出现在数据中，此时 `is_admin` 与 `is_retailer` 都为 false。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Retailer,
    Driver,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Retailer, Role::Driver];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Retailer => "retailer",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 角色解析错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "retailer" => Ok(Role::Retailer),
            "driver" => Ok(Role::Driver),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// 当前会话的认证方式。
///
/// 决定 logout / refresh 走哪条分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    OAuth,
    Jwt,
    #[default]
    None,
}

/// 应用用户。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub retailer_id: Option<String>,
    pub is_active: bool,
    pub preferred_language: String,
    pub last_login_at: Option<i64>,
    pub login_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AppUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_retailer(&self) -> bool {
        self.role == Role::Retailer
    }
}

/// 中间件解析出的请求身份，注入到下游请求头。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub retailer_id: Option<String>,
}

impl RequestIdentity {
    pub fn from_user(user: &AppUser) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            retailer_id: user.retailer_id.clone(),
        }
    }
}
