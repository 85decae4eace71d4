//! # PostgreSQL 存储实现模块
//!
//! 本模块提供存储接口的 PostgreSQL 实现，用于生产环境。
//!
//! ## 设计原则
//!
//! 1. **参数化查询**：所有 SQL 查询使用参数绑定，防止 SQL 注入
//! 2. **时间戳**：数据库使用 `timestamptz`，读写时统一换算为 Unix 毫秒
//! 3. **只追加审计**：`login_attempts` 只有 insert 与 select
//!
//! ## 包含的实现
//!
//! - **UserStore** (`user.rs`)：用户查找、建档、登录计数、口令迁移
//! - **RetailerStore** (`retailer.rs`)：零售商关联查询
//! - **LoginAttemptStore** (`login_attempt.rs`)：登录审计
//!
//! ## 数据库模式要求
//!
//! 见仓库根目录 `migrations/0001_init.sql`：
//! - `users`
//! - `retailers`
//! - `login_attempts`
//! - 函数 `get_user_for_login(text)`

pub mod login_attempt;
pub mod retailer;
pub mod user;

pub use login_attempt::*;
pub use retailer::*;
pub use user::*;
