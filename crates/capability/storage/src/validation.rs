//! 验证辅助函数
//!
//! 写入前的字段校验：
//! - ensure_present：必填字段非空
//! - ensure_new_user：新建用户的必填字段
//! - ensure_attempt：审计记录的必填字段

use crate::error::StorageError;
use crate::models::NewUser;
use domain::LoginAttempt;

/// 验证必填字段非空（去除首尾空格后）
pub fn ensure_present(field: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::new(format!("{field} required")));
    }
    Ok(())
}

/// 验证新建用户输入
pub fn ensure_new_user(user: &NewUser) -> Result<(), StorageError> {
    ensure_present("id", &user.id)?;
    ensure_present("email", &user.email)?;
    ensure_present("username", &user.username)
}

/// 验证审计记录
///
/// 查不到用户时 user_id 必须是 `unknown` 占位，而不是空串。
pub fn ensure_attempt(attempt: &LoginAttempt) -> Result<(), StorageError> {
    ensure_present("attempt_id", &attempt.attempt_id)?;
    ensure_present("user_id", &attempt.user_id)
}
