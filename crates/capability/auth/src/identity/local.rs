//! 进程内身份提供方。
//!
//! 账户表保存在内存中，口令使用 argon2 哈希，会话 token 由 [`JwtManager`] 签发。
//! 登出按 jti 吊销 token。未配置远端身份服务时由 API 进程使用，也是测试替身。

use super::{
    AuthChangeEvent, EVENT_CHANNEL_CAPACITY, IdentityError, IdentityProvider, IdentitySession,
    IdentityUser, OAuthProvider,
};
use crate::jwt::JwtManager;
use crate::password::{hash_password, verify_hash};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct LocalAccount {
    id: String,
    email: String,
    password_hash: Option<String>,
}

impl LocalAccount {
    fn to_identity_user(&self) -> IdentityUser {
        IdentityUser {
            id: self.id.clone(),
            email: Some(self.email.clone()),
        }
    }
}

/// 进程内身份提供方。
pub struct LocalIdentityProvider {
    jwt: JwtManager,
    site_url: String,
    /// 以小写邮箱为键
    accounts: RwLock<HashMap<String, LocalAccount>>,
    revoked: RwLock<HashSet<String>>,
    current: RwLock<Option<IdentitySession>>,
    reset_requests: RwLock<Vec<String>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl LocalIdentityProvider {
    pub fn new(jwt: JwtManager, site_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            jwt,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            accounts: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
            current: RwLock::new(None),
            reset_requests: RwLock::new(Vec::new()),
            events,
        }
    }

    /// 注册口令账户（随机 id）。
    pub fn register(&self, email: &str, password: &str) -> Result<IdentityUser, IdentityError> {
        self.register_with_id(&Uuid::new_v4().to_string(), email, Some(password))
    }

    /// 以指定 id 注册账户；`password` 为空表示仅 OAuth 账户。
    pub fn register_with_id(
        &self,
        id: &str,
        email: &str,
        password: Option<&str>,
    ) -> Result<IdentityUser, IdentityError> {
        let password_hash = password
            .map(hash_password)
            .transpose()
            .map_err(|err| IdentityError::Backend(err.to_string()))?;
        let account = LocalAccount {
            id: id.to_string(),
            email: email.trim().to_string(),
            password_hash,
        };
        let mut accounts = self.accounts.write().map_err(|_| lock_error())?;
        let key = email_key(email);
        if accounts.contains_key(&key) {
            return Err(IdentityError::Backend("email already registered".to_string()));
        }
        let user = account.to_identity_user();
        accounts.insert(key, account);
        Ok(user)
    }

    /// 模拟 OAuth 回调：账户不存在时创建，然后建立会话并广播 `SignedIn`。
    pub fn complete_oauth(
        &self,
        provider: OAuthProvider,
        email: &str,
    ) -> Result<IdentitySession, IdentityError> {
        let existing = self.find_account(email)?;
        let account = match existing {
            Some(account) => account,
            None => {
                self.register_with_id(&Uuid::new_v4().to_string(), email, None)?;
                self.find_account(email)?
                    .ok_or_else(|| IdentityError::Backend("account vanished".to_string()))?
            }
        };
        tracing::info!(provider = %provider, user_id = %account.id, "oauth sign-in completed");
        let session = self.issue_session(&account)?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// 轮换当前会话的 token 并广播 `TokenRefreshed`。
    pub fn refresh_session(&self) -> Result<IdentitySession, IdentityError> {
        let current = self
            .current
            .read()
            .map_err(|_| lock_error())?
            .clone()
            .ok_or(IdentityError::InvalidToken)?;
        let account = self
            .find_account_by_id(&current.user.id)?
            .ok_or(IdentityError::InvalidToken)?;
        if let Ok(claims) = self.jwt.decode(&current.access_token) {
            self.revoke(&claims.jti)?;
        }
        let session = self.issue_session(&account)?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    /// 已请求找回口令的邮箱（测试辅助）。
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests
            .read()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    fn issue_session(&self, account: &LocalAccount) -> Result<IdentitySession, IdentityError> {
        let issued = self.jwt.issue(&account.id, Some(&account.email))?;
        Ok(IdentitySession {
            access_token: issued.token,
            refresh_token: Some(issued.session_id),
            expires_at: issued.expires_at,
            user: account.to_identity_user(),
        })
    }

    fn find_account(&self, email: &str) -> Result<Option<LocalAccount>, IdentityError> {
        let accounts = self.accounts.read().map_err(|_| lock_error())?;
        Ok(accounts.get(&email_key(email)).cloned())
    }

    fn find_account_by_id(&self, id: &str) -> Result<Option<LocalAccount>, IdentityError> {
        let accounts = self.accounts.read().map_err(|_| lock_error())?;
        Ok(accounts.values().find(|account| account.id == id).cloned())
    }

    fn set_current(&self, session: Option<IdentitySession>) -> Result<(), IdentityError> {
        *self.current.write().map_err(|_| lock_error())? = session;
        Ok(())
    }

    fn revoke(&self, jti: &str) -> Result<(), IdentityError> {
        self.revoked
            .write()
            .map_err(|_| lock_error())?
            .insert(jti.to_string());
        Ok(())
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, IdentityError> {
        Ok(self.revoked.read().map_err(|_| lock_error())?.contains(jti))
    }

    fn emit(&self, event: AuthChangeEvent) {
        // 没有订阅者时发送失败，属于正常情况
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn get_session(&self) -> Result<Option<IdentitySession>, IdentityError> {
        Ok(self.current.read().map_err(|_| lock_error())?.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentitySession, IdentityError> {
        let account = self
            .find_account(email)?
            .ok_or(IdentityError::InvalidCredentials)?;
        let Some(stored) = account.password_hash.as_deref() else {
            return Err(IdentityError::InvalidCredentials);
        };
        let verified =
            verify_hash(stored, password).map_err(|err| IdentityError::Backend(err.to_string()))?;
        if !verified {
            return Err(IdentityError::InvalidCredentials);
        }
        let session = self.issue_session(&account)?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, IdentityError> {
        let mut params = vec![("provider", provider.as_str())];
        if let Some(redirect_to) = redirect_to {
            params.push(("redirect_to", redirect_to));
        }
        let url = reqwest::Url::parse_with_params(&format!("{}/authorize", self.site_url), &params)
            .map_err(|err| IdentityError::Backend(err.to_string()))?;
        Ok(url.to_string())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        if let Ok(claims) = self.jwt.decode(access_token) {
            self.revoke(&claims.jti)?;
        }
        let mut current = self.current.write().map_err(|_| lock_error())?;
        if current
            .as_ref()
            .is_some_and(|session| session.access_token == access_token)
        {
            *current = None;
        }
        drop(current);
        self.emit(AuthChangeEvent::SignedOut);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let claims = self.jwt.decode(access_token)?;
        if self.is_revoked(&claims.jti)? {
            return Err(IdentityError::InvalidToken);
        }
        let account = self
            .find_account_by_id(&claims.sub)?
            .ok_or(IdentityError::InvalidToken)?;
        Ok(account.to_identity_user())
    }

    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<IdentityUser, IdentityError> {
        let user = self.get_user(access_token).await?;
        let password_hash =
            hash_password(new_password).map_err(|err| IdentityError::Backend(err.to_string()))?;
        {
            let mut accounts = self.accounts.write().map_err(|_| lock_error())?;
            let account = accounts
                .values_mut()
                .find(|account| account.id == user.id)
                .ok_or(IdentityError::InvalidToken)?;
            account.password_hash = Some(password_hash);
        }
        self.emit(AuthChangeEvent::UserUpdated(user.clone()));
        Ok(user)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        _redirect_to: Option<&str>,
    ) -> Result<(), IdentityError> {
        // 与远端服务一致：未知邮箱同样返回成功
        self.reset_requests
            .write()
            .map_err(|_| lock_error())?
            .push(email_key(email));
        Ok(())
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn lock_error() -> IdentityError {
    IdentityError::Backend("lock failed".to_string())
}
