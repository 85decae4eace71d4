//! 协调后的认证状态。

use domain::{AppUser, AuthMode, Retailer};
use souk_auth::IdentitySession;

/// 认证状态。
///
/// 只能通过构造函数创建：`session` 只在 OAuth 模式下存在，`token` 只在
/// JWT 模式下存在，两者至多一个非空。派生布尔值没有对应字段。
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    user: Option<AppUser>,
    retailer: Option<Retailer>,
    session: Option<IdentitySession>,
    token: Option<String>,
    auth_mode: AuthMode,
    loading: bool,
}

impl AuthState {
    /// 挂载时的初始状态。
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::unauthenticated()
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            user: None,
            retailer: None,
            session: None,
            token: None,
            auth_mode: AuthMode::None,
            loading: false,
        }
    }

    pub fn oauth(user: AppUser, retailer: Option<Retailer>, session: IdentitySession) -> Self {
        Self {
            retailer: linked_retailer(&user, retailer),
            user: Some(user),
            session: Some(session),
            token: None,
            auth_mode: AuthMode::OAuth,
            loading: false,
        }
    }

    pub fn jwt(user: AppUser, retailer: Option<Retailer>, token: String) -> Self {
        Self {
            retailer: linked_retailer(&user, retailer),
            user: Some(user),
            session: None,
            token: Some(token),
            auth_mode: AuthMode::Jwt,
            loading: false,
        }
    }

    pub fn user(&self) -> Option<&AppUser> {
        self.user.as_ref()
    }

    pub fn retailer(&self) -> Option<&Retailer> {
        self.retailer.as_ref()
    }

    pub fn session(&self) -> Option<&IdentitySession> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some() || self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(AppUser::is_admin)
    }

    pub fn is_retailer(&self) -> bool {
        self.user.as_ref().is_some_and(AppUser::is_retailer)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::loading()
    }
}

/// 用户没有 retailer_id 时丢弃零售商。
fn linked_retailer(user: &AppUser, retailer: Option<Retailer>) -> Option<Retailer> {
    match user.retailer_id.as_deref() {
        Some(id) => retailer.filter(|retailer| retailer.id == id),
        None => None,
    }
}
