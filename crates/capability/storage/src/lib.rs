//! # Souk Storage 模块
//!
//! 本模块提供认证子系统使用的行存储抽象层，支持多种存储后端实现。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`UserStore`、`RetailerStore`、`LoginAttemptStore`
//! 2. **数据模型层** (`models.rs`)：存储侧用户记录（含口令列）、新建用户输入、登录查找结果
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **验证辅助层** (`validation.rs`)：写入前的字段校验
//! 5. **连接管理层** (`connection.rs`)：数据库连接池管理
//! 6. **实现层**：
//!    - `in_memory/`：内存存储实现（本地开发与测试）
//!    - `postgres/`：PostgreSQL 存储实现（生产环境使用）
//!
//! ## 数据表
//!
//! - `users`：应用用户（角色、零售商关联、语言、口令迁移状态）
//! - `retailers`：零售商档案
//! - `login_attempts`：登录审计，只追加，本模块从不更新或删除
//! - `get_user_for_login(username)`：数据库函数，用户名 → 邮箱桥接
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use souk_storage::{InMemoryUserStore, UserStore};
//!
//! let user_store = InMemoryUserStore::with_default_admin();
//! let user = user_store.find_by_username("admin").await?;
//! ```

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod traits;
pub mod validation;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::{InMemoryLoginAttemptStore, InMemoryRetailerStore, InMemoryUserStore};
pub use postgres::{PgLoginAttemptStore, PgRetailerStore, PgUserStore};
