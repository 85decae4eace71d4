//! 服务端认证门面。
//!
//! 所有公开操作都返回判别式结果而不是 `Err`：内部区分
//! 「账户不存在/停用」「凭据错误」「后端错误」三类（见 [`LoginFailure`]），
//! 但对外消息只有通用文案，不泄露具体是哪一类。

use crate::AuthError;
use crate::identity::{IdentityError, IdentityProvider};
use crate::password::{hash_password, validate_new_password, verify_credentials};
use domain::{AppUser, LoginAction, LoginAttempt, UNKNOWN_USER_ID, now_epoch_ms};
use souk_storage::{LoginAttemptStore, LoginLookup, UserRecord, UserStore};
use std::sync::Arc;
use uuid::Uuid;

pub const INVALID_EMAIL_OR_PASSWORD: &str = "Invalid email or password";
pub const INVALID_USERNAME_OR_PASSWORD: &str = "Invalid username or password";
pub const INVALID_CURRENT_PASSWORD: &str = "Current password is incorrect";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const GENERIC_ERROR: &str = "An error occurred";
pub const LOGGED_OUT: &str = "Logged out successfully";
pub const PASSWORD_CHANGED: &str = "Password changed successfully";
pub const PASSWORD_RESET_REQUESTED: &str =
    "If an account exists for this email, a password reset link has been sent";

/// 请求来源（审计用）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown", None)
    }
}

/// 内部失败分类，只用于日志与测试，不下发给客户端。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidCredentials,
    AccountUnavailable,
    InvalidToken,
    WeakPassword,
    Backend,
}

/// 登录结果。
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub success: bool,
    pub user: Option<AppUser>,
    pub token: Option<String>,
    /// 过期时间（Unix 毫秒）
    pub expires_at: Option<i64>,
    pub requires_password_change: bool,
    pub message: Option<String>,
    pub failure: Option<LoginFailure>,
}

impl LoginResult {
    fn failed(failure: LoginFailure, message: &str) -> Self {
        Self {
            success: false,
            user: None,
            token: None,
            expires_at: None,
            requires_password_change: false,
            message: Some(message.to_string()),
            failure: Some(failure),
        }
    }
}

/// token 校验结果。
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub valid: bool,
    pub user: Option<AppUser>,
    pub error: Option<String>,
    pub failure: Option<LoginFailure>,
}

impl TokenValidation {
    fn invalid(failure: LoginFailure) -> Self {
        let message = match failure {
            LoginFailure::Backend => GENERIC_ERROR,
            _ => INVALID_TOKEN,
        };
        Self {
            valid: false,
            user: None,
            error: Some(message.to_string()),
            failure: Some(failure),
        }
    }
}

/// 改密结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChangeResult {
    pub success: bool,
    pub message: String,
    pub failure: Option<LoginFailure>,
}

impl PasswordChangeResult {
    fn changed() -> Self {
        Self {
            success: true,
            message: PASSWORD_CHANGED.to_string(),
            failure: None,
        }
    }

    fn failed(failure: LoginFailure, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            failure: Some(failure),
        }
    }
}

/// 登出结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutResult {
    pub success: bool,
    pub message: String,
}

/// 找回口令结果（总是成功）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetResult {
    pub success: bool,
    pub message: String,
}

/// 认证服务。
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    attempts: Arc<dyn LoginAttemptStore>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        attempts: Arc<dyn LoginAttemptStore>,
    ) -> Self {
        Self {
            identity,
            users,
            attempts,
        }
    }

    /// 通过身份提供方登录（邮箱 + 口令）。
    ///
    /// 凭据通过但应用用户缺失或停用时，会主动登出身份会话，避免遗留
    /// 没有应用用户的孤立会话。
    pub async fn login_with_supabase(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> LoginResult {
        let session = match self.identity.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(IdentityError::InvalidCredentials) => {
                tracing::info!("identity login rejected");
                self.audit(UNKNOWN_USER_ID, client, false, LoginAction::Login)
                    .await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(
                    LoginFailure::InvalidCredentials,
                    INVALID_EMAIL_OR_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity login failed");
                souk_telemetry::record_login(false);
                return LoginResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };

        let user = match self.users.find_by_id(&session.user.id).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(found) => {
                let audit_user = found
                    .as_ref()
                    .map(|user| user.id.as_str())
                    .unwrap_or(UNKNOWN_USER_ID);
                tracing::info!(
                    identity_id = %session.user.id,
                    found = found.is_some(),
                    "application user missing or inactive"
                );
                self.force_sign_out(&session.access_token).await;
                self.audit(audit_user, client, false, LoginAction::Login)
                    .await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(
                    LoginFailure::AccountUnavailable,
                    INVALID_EMAIL_OR_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed during login");
                self.force_sign_out(&session.access_token).await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };

        let app_user = self.stamp_login(&user).await;
        self.audit(&user.id, client, true, LoginAction::Login).await;
        souk_telemetry::record_login(true);
        tracing::info!(user_id = %user.id, "login succeeded");
        LoginResult {
            success: true,
            user: Some(app_user),
            token: Some(session.access_token),
            expires_at: Some(session.expires_at),
            requires_password_change: user.must_change_password,
            message: None,
            failure: None,
        }
    }

    /// 用户名登录：先经 `get_user_for_login` 解析邮箱，再走身份提供方登录。
    pub async fn login_with_username(
        &self,
        username: &str,
        password: &str,
        client: &ClientInfo,
    ) -> LoginResult {
        let lookup = match self.lookup_login_email(username).await {
            Ok(Some(lookup)) => lookup,
            Ok(None) => {
                self.audit(UNKNOWN_USER_ID, client, false, LoginAction::Login)
                    .await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(
                    LoginFailure::InvalidCredentials,
                    INVALID_USERNAME_OR_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "login lookup failed");
                souk_telemetry::record_login(false);
                return LoginResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };
        if !lookup.is_active {
            self.audit(&lookup.user_id, client, false, LoginAction::Login)
                .await;
            souk_telemetry::record_login(false);
            return LoginResult::failed(
                LoginFailure::AccountUnavailable,
                INVALID_USERNAME_OR_PASSWORD,
            );
        }
        if lookup.needs_migration {
            tracing::debug!(user_id = %lookup.user_id, "account still on temporary password");
        }

        let mut result = self
            .login_with_supabase(&lookup.email, password, client)
            .await;
        if result.failure != Some(LoginFailure::Backend) && !result.success {
            result.message = Some(INVALID_USERNAME_OR_PASSWORD.to_string());
        }
        result
    }

    /// 用户名 → 登录邮箱。
    pub async fn lookup_login_email(
        &self,
        username: &str,
    ) -> Result<Option<LoginLookup>, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(None);
        }
        Ok(self.users.get_user_for_login(username).await?)
    }

    /// 旧版用户名口令登录。
    ///
    /// 只校验口令并记录审计，不签发 token；token 必须经由身份提供方登录获得。
    /// 通过临时口令登录的账户会被标记为必须改密。
    pub async fn login_with_credentials(
        &self,
        username: &str,
        password: &str,
        client: &ClientInfo,
    ) -> LoginResult {
        let user = match self.users.find_by_username(username.trim()).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.audit(UNKNOWN_USER_ID, client, false, LoginAction::Login)
                    .await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(
                    LoginFailure::InvalidCredentials,
                    INVALID_USERNAME_OR_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed during legacy login");
                souk_telemetry::record_login(false);
                return LoginResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };

        if !user.is_active {
            self.audit(&user.id, client, false, LoginAction::Login).await;
            souk_telemetry::record_login(false);
            return LoginResult::failed(
                LoginFailure::AccountUnavailable,
                INVALID_USERNAME_OR_PASSWORD,
            );
        }

        let check = match verify_credentials(
            user.password_hash.as_deref(),
            user.temp_password.as_deref(),
            password,
        ) {
            Ok(check) => check,
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "stored password hash unreadable");
                self.audit(&user.id, client, false, LoginAction::Login).await;
                souk_telemetry::record_login(false);
                return LoginResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };
        if !check.verified {
            self.audit(&user.id, client, false, LoginAction::Login).await;
            souk_telemetry::record_login(false);
            return LoginResult::failed(
                LoginFailure::InvalidCredentials,
                INVALID_USERNAME_OR_PASSWORD,
            );
        }

        let mut requires_password_change = user.must_change_password;
        if check.via_temp_password {
            requires_password_change = true;
            if let Err(err) = self.users.set_must_change_password(&user.id, true).await {
                tracing::warn!(user_id = %user.id, error = %err, "failed to flag password change");
            }
        }

        let app_user = self.stamp_login(&user).await;
        self.audit(&user.id, client, true, LoginAction::Login).await;
        souk_telemetry::record_login(true);
        LoginResult {
            success: true,
            user: Some(app_user),
            token: None,
            expires_at: None,
            requires_password_change,
            message: None,
            failure: None,
        }
    }

    /// 校验 bearer token，并重新读取应用用户确认仍处于启用状态。
    pub async fn validate_supabase_token(&self, token: &str) -> TokenValidation {
        let identity_user = match self.identity.get_user(token).await {
            Ok(user) => user,
            Err(err) => {
                souk_telemetry::record_token_validation_failure();
                let failure = if matches!(err, IdentityError::Backend(_)) {
                    tracing::warn!(error = %err, "token validation backend error");
                    LoginFailure::Backend
                } else {
                    tracing::debug!(error = %err, "token rejected");
                    LoginFailure::InvalidToken
                };
                return TokenValidation::invalid(failure);
            }
        };

        match self.users.find_by_id(&identity_user.id).await {
            Ok(Some(user)) if user.is_active => TokenValidation {
                valid: true,
                user: Some(user.to_app_user()),
                error: None,
                failure: None,
            },
            Ok(_) => {
                souk_telemetry::record_token_validation_failure();
                TokenValidation::invalid(LoginFailure::AccountUnavailable)
            }
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed during token validation");
                souk_telemetry::record_token_validation_failure();
                TokenValidation::invalid(LoginFailure::Backend)
            }
        }
    }

    /// [`AuthService::validate_supabase_token`] 的别名。
    pub async fn validate_token(&self, token: &str) -> TokenValidation {
        self.validate_supabase_token(token).await
    }

    /// 登出身份会话并记录审计。
    ///
    /// 无法解析当前用户时仍然登出，只是不写审计。
    pub async fn logout_supabase(&self, token: &str, client: &ClientInfo) -> LogoutResult {
        let resolved = match self.identity.get_user(token).await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::debug!(error = %err, "logout without resolvable user");
                None
            }
        };

        let outcome = self.identity.sign_out(token).await;
        if let Some(user) = &resolved {
            self.audit(&user.id, client, outcome.is_ok(), LoginAction::Logout)
                .await;
        }
        match outcome {
            Ok(()) => {
                souk_telemetry::record_logout();
                LogoutResult {
                    success: true,
                    message: LOGGED_OUT.to_string(),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity sign-out failed");
                LogoutResult {
                    success: false,
                    message: GENERIC_ERROR.to_string(),
                }
            }
        }
    }

    /// 通过身份提供方改密，成功后在本地清除强制改密标记。
    pub async fn change_password_supabase(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> PasswordChangeResult {
        if let Err(err) = validate_new_password(new_password) {
            return PasswordChangeResult::failed(LoginFailure::WeakPassword, err.to_string());
        }

        let user = match self.identity.update_user_password(token, new_password).await {
            Ok(user) => user,
            Err(err) => {
                let failure = if err.is_token_error() {
                    LoginFailure::InvalidToken
                } else {
                    tracing::warn!(error = %err, "identity password update failed");
                    LoginFailure::Backend
                };
                return PasswordChangeResult::failed(failure, GENERIC_ERROR);
            }
        };

        if let Err(err) = self.users.set_must_change_password(&user.id, false).await {
            tracing::warn!(user_id = %user.id, error = %err, "failed to clear password change flag");
        }
        self.audit(&user.id, client, true, LoginAction::PasswordChange)
            .await;
        souk_telemetry::record_password_change();
        PasswordChangeResult::changed()
    }

    /// 旧版改密：先校验当前口令（哈希或临时口令），再写入新哈希。
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> PasswordChangeResult {
        if let Err(err) = validate_new_password(new_password) {
            return PasswordChangeResult::failed(LoginFailure::WeakPassword, err.to_string());
        }

        let user = match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.audit(UNKNOWN_USER_ID, client, false, LoginAction::PasswordChange)
                    .await;
                return PasswordChangeResult::failed(
                    LoginFailure::AccountUnavailable,
                    INVALID_CURRENT_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed during password change");
                return PasswordChangeResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };

        match verify_credentials(
            user.password_hash.as_deref(),
            user.temp_password.as_deref(),
            current_password,
        ) {
            Ok(check) if check.verified => {}
            Ok(_) => {
                self.audit(&user.id, client, false, LoginAction::PasswordChange)
                    .await;
                return PasswordChangeResult::failed(
                    LoginFailure::InvalidCredentials,
                    INVALID_CURRENT_PASSWORD,
                );
            }
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "stored password hash unreadable");
                return PasswordChangeResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        }

        let written = match hash_password(new_password) {
            Ok(hash) => self.users.update_password_hash(&user.id, &hash).await,
            Err(err) => {
                tracing::warn!(error = %err, "password hashing failed");
                return PasswordChangeResult::failed(LoginFailure::Backend, GENERIC_ERROR);
            }
        };
        match written {
            Ok(true) => {
                self.audit(&user.id, client, true, LoginAction::PasswordChange)
                    .await;
                souk_telemetry::record_password_change();
                PasswordChangeResult::changed()
            }
            Ok(false) => {
                tracing::warn!(user_id = %user.id, "password update matched no row");
                PasswordChangeResult::failed(LoginFailure::Backend, GENERIC_ERROR)
            }
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "password update failed");
                PasswordChangeResult::failed(LoginFailure::Backend, GENERIC_ERROR)
            }
        }
    }

    /// 请求找回口令邮件；对调用方总是报告成功。
    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> PasswordResetResult {
        if let Err(err) = self
            .identity
            .reset_password_for_email(email.trim(), redirect_to)
            .await
        {
            tracing::warn!(error = %err, "password reset request failed");
        }
        PasswordResetResult {
            success: true,
            message: PASSWORD_RESET_REQUESTED.to_string(),
        }
    }

    /// 按时间倒序列出用户的登录审计。
    pub async fn list_login_attempts(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<LoginAttempt>, AuthError> {
        Ok(self.attempts.list_for_user(user_id, limit).await?)
    }

    /// 写入 last_login_at 与 login_count；失败只记日志。
    async fn stamp_login(&self, user: &UserRecord) -> AppUser {
        let now = now_epoch_ms();
        let mut app_user = user.to_app_user();
        match self.users.record_login(&user.id, now).await {
            Ok(true) => {
                app_user.last_login_at = Some(now);
                app_user.login_count += 1;
            }
            Ok(false) => {
                tracing::warn!(user_id = %user.id, "last login update matched no row");
            }
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "failed to stamp last login");
            }
        }
        app_user
    }

    async fn force_sign_out(&self, access_token: &str) {
        if let Err(err) = self.identity.sign_out(access_token).await {
            tracing::warn!(error = %err, "failed to sign out orphaned identity session");
        }
    }

    async fn audit(&self, user_id: &str, client: &ClientInfo, success: bool, action: LoginAction) {
        let attempt = LoginAttempt {
            attempt_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            ip_address: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            success,
            action,
            ts_ms: now_epoch_ms(),
        };
        if let Err(err) = self.attempts.append(attempt).await {
            tracing::warn!(
                user_id = %user_id,
                action = action.as_str(),
                error = %err,
                "failed to record login attempt"
            );
        }
    }
}
