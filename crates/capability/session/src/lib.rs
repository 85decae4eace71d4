//! 客户端会话能力。
//!
//! - `storage`：token 与用户缓存（cookie + 持久存储双写）
//! - `state`：协调后的认证状态
//! - `reconciler`：会话协调状态机（OAuth / JWT 两条分支）
//! - `context`：在任务范围内分发协调器
//! - `guard`：路由守卫与角色门

pub mod context;
pub mod guard;
pub mod reconciler;
pub mod state;
pub mod storage;

pub use context::{AuthContext, AuthProvider, try_auth_context, use_auth_context};
pub use guard::{
    AuthGuard, Component, Guard, GuardController, GuardOutcome, Guarded, GuestGuard, Navigator,
    Rendered, with_auth,
};
pub use reconciler::{
    ActionResult, AuthReconciler, LOGIN_UNAVAILABLE, ReconcilerOptions, Subscription,
    username_from_email,
};
pub use state::AuthState;
pub use storage::{
    AUTH_TOKEN_KEY, CookieBackend, DEFAULT_COOKIE_MAX_AGE, FileBackend, MemoryBackend,
    StorageBackend, TokenStorage, USER_DATA_KEY,
};

/// 会话层错误。
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Identity(#[from] souk_auth::IdentityError),
}
