//! 认证能力：身份提供方、口令工具、服务端认证门面与请求授权。

mod authorizer;
pub mod identity;
mod jwt;
mod password;
mod service;

use souk_storage::StorageError;

pub use authorizer::{
    AuthRequest, AuthorizationDecision, Authorizer, AuthorizerOptions, RoleAccess,
    SESSION_COOKIE, login_redirect, path_matches,
};
pub use identity::{
    AuthChangeEvent, IdentityError, IdentityProvider, IdentitySession, IdentityUser,
    LocalIdentityProvider, OAuthProvider, RemoteIdentityProvider,
};
pub use jwt::{IssuedToken, JwtManager};
pub use password::{
    MIN_PASSWORD_LEN, PasswordCheck, hash_password, validate_new_password, verify_credentials,
    verify_hash,
};
pub use service::{
    AuthService, ClientInfo, GENERIC_ERROR, INVALID_CURRENT_PASSWORD, INVALID_EMAIL_OR_PASSWORD,
    INVALID_TOKEN, INVALID_USERNAME_OR_PASSWORD, LOGGED_OUT, LoginFailure, LoginResult,
    LogoutResult, PASSWORD_CHANGED, PASSWORD_RESET_REQUESTED, PasswordChangeResult,
    PasswordResetResult, TokenValidation,
};

/// 认证相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account inactive or not found")]
    AccountUnavailable,
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}
