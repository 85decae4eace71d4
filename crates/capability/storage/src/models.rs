//! 数据模型
//!
//! 定义存储侧的数据结构：
//! - 用户模型：UserRecord（含口令哈希/临时口令列，不离开服务端）
//! - 新建用户：NewUser（OAuth 首次登录自动建档使用）
//! - 登录查找：LoginLookup（`get_user_for_login` 的返回行）
//!
//! 零售商与登录审计直接使用 `domain` 中的模型。

use domain::{AppUser, Role};

/// 用户记录。
#[derive(Debug, Clone)]
pub struct UserRecord {
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
    /// argon2 哈希；尚未迁移的账户为空
    pub password_hash: Option<String>,
    /// 迁移前的临时明文口令
    pub temp_password: Option<String>,
    pub must_change_password: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRecord {
    /// 转换为去掉口令列的应用用户。
    pub fn to_app_user(&self) -> AppUser {
        AppUser {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            role: self.role,
            retailer_id: self.retailer_id.clone(),
            is_active: self.is_active,
            preferred_language: self.preferred_language.clone(),
            last_login_at: self.last_login_at,
            login_count: self.login_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 新建用户输入。
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub retailer_id: Option<String>,
    pub is_active: bool,
    pub preferred_language: String,
}

/// 用户名登录桥接结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLookup {
    pub user_id: String,
    pub email: String,
    pub is_active: bool,
    /// 账户早于当前认证方案，仍使用临时口令
    pub needs_migration: bool,
}

impl From<&UserRecord> for LoginLookup {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.id.clone(),
            email: record.email.clone(),
            is_active: record.is_active,
            needs_migration: record.password_hash.is_none() && record.temp_password.is_some(),
        }
    }
}
