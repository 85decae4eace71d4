//! 内存存储实现模块
//!
//! 用于本地开发（未配置数据库时）与测试。
//!
//! 包含以下实现：
//! - UserStore: InMemoryUserStore
//! - RetailerStore: InMemoryRetailerStore
//! - LoginAttemptStore: InMemoryLoginAttemptStore
//!
//! 每个实现都带有 `set_offline` 开关，用于模拟后端故障。

pub mod login_attempt;
pub mod retailer;
pub mod user;

pub use login_attempt::*;
pub use retailer::*;
pub use user::*;

use crate::error::StorageError;

pub(crate) fn offline_error() -> StorageError {
    StorageError::new("storage offline")
}

pub(crate) fn lock_error() -> StorageError {
    StorageError::new("lock failed")
}
