//! 存储接口 Trait 定义
//!
//! 定义认证子系统使用的异步存储接口：
//! - UserStore：应用用户存储
//! - RetailerStore：零售商存储（只读关联查询）
//! - LoginAttemptStore：登录审计（只追加）
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{LoginLookup, NewUser, UserRecord};
use async_trait::async_trait;
use domain::{LoginAttempt, Retailer};

/// 用户存储接口
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 根据 id（与身份提供方账户 id 相同）查找用户
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError>;

    /// 根据用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// 用户名 → 邮箱桥接，附带迁移标记
    async fn get_user_for_login(&self, username: &str)
    -> Result<Option<LoginLookup>, StorageError>;

    /// 创建用户；id 或用户名已存在时返回错误
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError>;

    /// 记录一次成功登录：写入 last_login_at 并累加 login_count
    async fn record_login(&self, user_id: &str, at_ms: i64) -> Result<bool, StorageError>;

    /// 写入新口令哈希，并清除临时口令与强制改密标记
    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError>;

    /// 设置强制改密标记
    async fn set_must_change_password(
        &self,
        user_id: &str,
        must_change: bool,
    ) -> Result<bool, StorageError>;
}

/// 零售商存储接口
#[async_trait]
pub trait RetailerStore: Send + Sync {
    async fn find_retailer(&self, retailer_id: &str) -> Result<Option<Retailer>, StorageError>;
}

/// 登录审计存储接口
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// 追加一条记录
    async fn append(&self, attempt: LoginAttempt) -> Result<LoginAttempt, StorageError>;

    /// 按时间倒序列出用户的记录；limit 为 0 表示不限制
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<LoginAttempt>, StorageError>;
}
