//! 会话协调状态机。
//!
//! 每次协调（挂载、认证事件、`refresh_user`）：
//! 1. 查询身份提供方当前会话
//! 2. 有会话走 OAuth 分支：按会话用户 id 读取应用用户，缺失时自动建档，
//!    再按 `retailer_id` 尽力读取零售商
//! 3. 无会话走 JWT 分支：读取本地缓存的 token 与用户，不做网络校验
//!
//! 状态通过 watch 通道发布。每次协调开始时领取一个代数，发布时代数已过期
//! 的结果被丢弃，慢的旧协调不会覆盖新事件的结果。

use crate::state::AuthState;
use crate::storage::TokenStorage;
use crate::SessionError;
use domain::{AppUser, AuthMode, Retailer, Role};
use souk_auth::{AuthChangeEvent, IdentityProvider, IdentitySession, IdentityUser, OAuthProvider};
use souk_storage::{NewUser, RetailerStore, UserStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const LOGIN_UNAVAILABLE: &str = "Username/password login is not available";

/// 协调器选项。
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// OAuth 首次登录自动建档使用的角色
    pub default_oauth_role: Role,
    pub default_language: String,
    /// OAuth 回调地址
    pub oauth_redirect_to: Option<String>,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            default_oauth_role: Role::Admin,
            default_language: "en".to_string(),
            oauth_redirect_to: None,
        }
    }
}

/// 动作结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: Option<String>,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    retailers: Arc<dyn RetailerStore>,
    storage: TokenStorage,
    options: ReconcilerOptions,
    generation: AtomicU64,
    state: watch::Sender<AuthState>,
}

/// 会话协调器（可克隆，克隆共享同一状态）。
#[derive(Clone)]
pub struct AuthReconciler {
    inner: Arc<Inner>,
}

impl AuthReconciler {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        retailers: Arc<dyn RetailerStore>,
        storage: TokenStorage,
        options: ReconcilerOptions,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        Self {
            inner: Arc::new(Inner {
                identity,
                users,
                retailers,
                storage,
                options,
                generation: AtomicU64::new(0),
                state,
            }),
        }
    }

    /// 当前状态快照。
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// 订阅状态变化。
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn storage(&self) -> &TokenStorage {
        &self.inner.storage
    }

    /// 订阅认证事件后执行首次协调。
    pub async fn start(&self) -> Subscription {
        let subscription = self.subscribe();
        self.initialize().await;
        subscription
    }

    /// 执行一次完整协调。
    pub async fn initialize(&self) {
        let generation = self.begin();
        let next = self.resolve().await;
        self.publish(generation, next);
    }

    /// 在后台任务中监听认证事件。
    pub fn subscribe(&self) -> Subscription {
        let mut events = self.inner.identity.subscribe();
        let reconciler = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => reconciler.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "auth events lagged, reconciling from scratch");
                        reconciler.initialize().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription {
            handle: Some(handle),
        }
    }

    /// 处理单个认证事件。
    ///
    /// 登出事件只在 OAuth 模式下清除状态，JWT 会话不受影响。
    pub async fn handle_event(&self, event: AuthChangeEvent) {
        match event {
            AuthChangeEvent::SignedIn(session) | AuthChangeEvent::TokenRefreshed(session) => {
                let generation = self.begin();
                let next = self.oauth_state(session).await;
                self.publish(generation, next);
            }
            AuthChangeEvent::UserUpdated(_) => self.refresh_user().await,
            AuthChangeEvent::SignedOut => {
                if self.state().auth_mode() == AuthMode::OAuth {
                    let generation = self.begin();
                    self.publish(generation, AuthState::unauthenticated());
                } else {
                    tracing::debug!("ignoring sign-out event outside oauth mode");
                }
            }
            AuthChangeEvent::PasswordRecovery => {}
        }
    }

    /// 用户名口令登录，尚未开放。
    pub async fn login(&self, _username: &str, _password: &str) -> ActionResult {
        ActionResult {
            success: false,
            message: Some(LOGIN_UNAVAILABLE.to_string()),
        }
    }

    /// 发起 OAuth 登录，返回授权跳转地址。
    pub async fn login_with_oauth(&self, provider: OAuthProvider) -> Result<String, SessionError> {
        let redirect_to = self.inner.options.oauth_redirect_to.as_deref();
        match self.inner.identity.sign_in_with_oauth(provider, redirect_to).await {
            Ok(url) => Ok(url),
            Err(err) => {
                tracing::warn!(provider = %provider, error = %err, "oauth sign-in failed");
                Err(err.into())
            }
        }
    }

    /// 登出；身份提供方调用失败时仍清除本地状态。
    pub async fn logout(&self) {
        let current = self.state();
        if current.auth_mode() == AuthMode::OAuth {
            if let Some(session) = current.session() {
                if let Err(err) = self.inner.identity.sign_out(&session.access_token).await {
                    tracing::warn!(error = %err, "identity sign-out failed");
                }
            }
        }
        self.inner.storage.clear_auth_data();
        let generation = self.begin();
        self.publish(generation, AuthState::unauthenticated());
    }

    /// 用当前持有的会话或 token 重新执行对应分支。
    pub async fn refresh_user(&self) {
        let current = self.state();
        let generation = self.begin();
        let next = match (current.auth_mode(), current.session(), current.token()) {
            (AuthMode::OAuth, Some(session), _) => self.oauth_state(session.clone()).await,
            (AuthMode::Jwt, _, Some(token)) => self.jwt_state(token.to_string()).await,
            _ => self.resolve().await,
        };
        self.publish(generation, next);
    }

    fn begin(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 只有最新一代的结果会被发布。
    fn publish(&self, generation: u64, next: AuthState) -> bool {
        let inner = &self.inner;
        let published = inner.state.send_if_modified(|current| {
            if inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = next;
            true
        });
        if !published {
            tracing::debug!(generation, "discarding stale reconciliation");
            souk_telemetry::record_reconcile_discarded();
        }
        published
    }

    async fn resolve(&self) -> AuthState {
        match self.inner.identity.get_session().await {
            Ok(Some(session)) => self.oauth_state(session).await,
            Ok(None) => match self.inner.storage.get_auth_token() {
                Some(token) => self.jwt_state(token).await,
                None => AuthState::unauthenticated(),
            },
            Err(err) => {
                tracing::warn!(error = %err, "session lookup failed");
                AuthState::unauthenticated()
            }
        }
    }

    async fn oauth_state(&self, session: IdentitySession) -> AuthState {
        let user = match self.inner.users.find_by_id(&session.user.id).await {
            Ok(Some(record)) => record.to_app_user(),
            Ok(None) => match self.provision(&session.user).await {
                Some(user) => user,
                None => return AuthState::unauthenticated(),
            },
            Err(err) => {
                tracing::warn!(user_id = %session.user.id, error = %err, "user lookup failed");
                return AuthState::unauthenticated();
            }
        };
        if !user.is_active {
            tracing::info!(user_id = %user.id, "application user inactive");
            return AuthState::unauthenticated();
        }
        let retailer = self.load_retailer(&user).await;
        AuthState::oauth(user, retailer, session)
    }

    async fn jwt_state(&self, token: String) -> AuthState {
        // 这一层不做 token 网络校验，由服务端负责
        let Some(user) = self.inner.storage.get_user_data() else {
            tracing::debug!("token present without cached user");
            return AuthState::unauthenticated();
        };
        if !user.is_active {
            tracing::info!(user_id = %user.id, "cached user inactive, clearing auth data");
            self.inner.storage.clear_auth_data();
            return AuthState::unauthenticated();
        }
        let retailer = self.load_retailer(&user).await;
        AuthState::jwt(user, retailer, token)
    }

    /// OAuth 首次登录自动建档；失败返回 None。
    async fn provision(&self, identity_user: &IdentityUser) -> Option<AppUser> {
        let email = identity_user.email.clone().unwrap_or_default();
        let new_user = NewUser {
            id: identity_user.id.clone(),
            username: username_from_email(&email),
            email,
            full_name: None,
            role: self.inner.options.default_oauth_role,
            retailer_id: None,
            is_active: true,
            preferred_language: self.inner.options.default_language.clone(),
        };
        match self.inner.users.create_user(new_user).await {
            Ok(record) => {
                tracing::info!(user_id = %record.id, role = %record.role, "provisioned oauth user");
                Some(record.to_app_user())
            }
            // 并发的另一次协调可能已写入同一用户
            Err(err) => match self.inner.users.find_by_id(&identity_user.id).await {
                Ok(Some(record)) => {
                    tracing::debug!(user_id = %record.id, "user provisioned concurrently");
                    Some(record.to_app_user())
                }
                _ => {
                    tracing::warn!(user_id = %identity_user.id, error = %err, "user provisioning failed");
                    None
                }
            },
        }
    }

    /// 零售商查询失败不影响认证。
    async fn load_retailer(&self, user: &AppUser) -> Option<Retailer> {
        let retailer_id = user.retailer_id.as_deref()?;
        match self.inner.retailers.find_retailer(retailer_id).await {
            Ok(Some(retailer)) => Some(retailer),
            Ok(None) => {
                tracing::info!(user_id = %user.id, retailer_id, "retailer not found");
                None
            }
            Err(err) => {
                tracing::warn!(user_id = %user.id, retailer_id, error = %err, "retailer lookup failed");
                None
            }
        }
    }
}

/// 邮箱本地部分作为用户名：`jane@x.com` → `jane`。
pub fn username_from_email(email: &str) -> String {
    email
        .split_once('@')
        .map(|(local, _)| local)
        .unwrap_or(email)
        .to_string()
}

/// 认证事件监听句柄；`unsubscribe` 或 drop 时停止监听。
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_email_local_part() {
        assert_eq!(username_from_email("jane@x.com"), "jane");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
    }
}
