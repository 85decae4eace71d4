//! 请求授权决策。
//!
//! 每个请求独立决策，不跨请求保存状态：
//! 1. 公开路径直接放行
//! 2. 取 token（cookie 优先，其次 `Authorization: Bearer`），缺失则重定向登录页
//! 3. 身份提供方校验 token，失败或超时重定向
//! 4. 重新读取应用用户并要求启用，失败或超时重定向
//! 5. 路径前缀 → 角色表，角色不在允许列表中返回 403
//! 6. 通过则返回解析出的身份，由 HTTP 层注入下游请求头

use crate::identity::IdentityProvider;
use domain::{RequestIdentity, Role};
use reqwest::Url;
use souk_storage::UserStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 身份提供方会话 cookie 名。
pub const SESSION_COOKIE: &str = "sb-access-token";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// 路径前缀 → 允许角色；最长前缀优先。
#[derive(Debug, Clone, Default)]
pub struct RoleAccess {
    entries: Vec<(String, Vec<Role>)>,
}

impl RoleAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, prefix: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        self.entries
            .push((prefix.into(), roles.into_iter().collect()));
        self
    }

    /// 匹配路径的允许角色；无匹配返回 None（不限角色）。
    pub fn allowed_roles(&self, path: &str) -> Option<&[Role]> {
        self.entries
            .iter()
            .filter(|(prefix, _)| path_matches(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, roles)| roles.as_slice())
    }
}

/// 授权选项。
#[derive(Debug, Clone)]
pub struct AuthorizerOptions {
    pub public_paths: Vec<String>,
    pub auth_path: String,
    /// 为空表示所有非公开路径都受保护
    pub protected_paths: Vec<String>,
    pub role_access: RoleAccess,
    /// 单次身份/数据库调用超时
    pub timeout: Duration,
}

impl Default for AuthorizerOptions {
    fn default() -> Self {
        Self {
            public_paths: ["/login", "/register", "/health", "/api/auth"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            auth_path: "/login".to_string(),
            protected_paths: Vec::new(),
            role_access: RoleAccess::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 授权所需的请求视图（与 HTTP 框架无关）。
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub path: String,
    pub query: Option<String>,
    pub cookie_token: Option<String>,
    pub bearer_token: Option<String>,
}

impl AuthRequest {
    /// cookie 优先，其次 bearer。
    pub fn token(&self) -> Option<&str> {
        self.tokens().next()
    }

    /// 按优先级排列的候选 token：空值跳过，与 cookie 相同的 bearer 不重复。
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        let cookie = self.cookie_token.as_deref().filter(|token| !token.is_empty());
        let bearer = self
            .bearer_token
            .as_deref()
            .filter(|token| !token.is_empty() && Some(*token) != cookie);
        cookie.into_iter().chain(bearer)
    }
}

/// 授权决策。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// 公开或不受保护的路径，原样放行
    Pass,
    /// 未认证，跳转登录页
    Redirect { location: String },
    /// 已认证但角色不允许
    Forbidden { role: Role },
    /// 已认证，携带解析出的身份继续
    Authorized(RequestIdentity),
}

/// 请求授权器。
pub struct Authorizer {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    options: AuthorizerOptions,
}

impl Authorizer {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        options: AuthorizerOptions,
    ) -> Self {
        Self {
            identity,
            users,
            options,
        }
    }

    pub fn options(&self) -> &AuthorizerOptions {
        &self.options
    }

    /// 对单个请求做出决策；任何失败都落在重定向或 403，不返回错误。
    pub async fn authorize(&self, request: &AuthRequest) -> AuthorizationDecision {
        let path = request.path.as_str();
        if self.is_public(path) || !self.is_protected(path) {
            souk_telemetry::record_middleware_pass();
            return AuthorizationDecision::Pass;
        }

        // 失效的 cookie 不应挡住有效的 bearer token
        let mut resolved = None;
        for token in request.tokens() {
            match self.bounded(self.identity.get_user(token)).await {
                Some(Ok(user)) => {
                    resolved = Some(user);
                    break;
                }
                Some(Err(err)) => {
                    tracing::debug!(path, error = %err, "token rejected by identity provider");
                }
                None => return self.redirect(request),
            }
        }
        let Some(identity_user) = resolved else {
            return self.redirect(request);
        };

        let user = match self.bounded(self.users.find_by_id(&identity_user.id)).await {
            Some(Ok(Some(user))) if user.is_active => user,
            Some(Ok(_)) => {
                tracing::info!(user_id = %identity_user.id, "application user missing or inactive");
                return self.redirect(request);
            }
            Some(Err(err)) => {
                tracing::warn!(user_id = %identity_user.id, error = %err, "user lookup failed");
                return self.redirect(request);
            }
            None => return self.redirect(request),
        };

        if let Some(allowed) = self.options.role_access.allowed_roles(path) {
            if !allowed.contains(&user.role) {
                tracing::info!(path, user_id = %user.id, role = %user.role, "role not allowed");
                souk_telemetry::record_middleware_forbidden();
                return AuthorizationDecision::Forbidden { role: user.role };
            }
        }

        souk_telemetry::record_middleware_pass();
        AuthorizationDecision::Authorized(RequestIdentity::from_user(&user.to_app_user()))
    }

    fn is_public(&self, path: &str) -> bool {
        self.options
            .public_paths
            .iter()
            .any(|prefix| path_matches(path, prefix))
    }

    fn is_protected(&self, path: &str) -> bool {
        self.options.protected_paths.is_empty()
            || self
                .options
                .protected_paths
                .iter()
                .any(|prefix| path_matches(path, prefix))
    }

    fn redirect(&self, request: &AuthRequest) -> AuthorizationDecision {
        souk_telemetry::record_middleware_redirect();
        AuthorizationDecision::Redirect {
            location: login_redirect(
                &self.options.auth_path,
                &request.path,
                request.query.as_deref(),
            ),
        }
    }

    /// 超时返回 None。
    async fn bounded<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(self.options.timeout, fut).await {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(timeout_ms = self.options.timeout.as_millis() as u64, "auth call timed out");
                souk_telemetry::record_middleware_timeout();
                None
            }
        }
    }
}

/// 按路径段匹配前缀：`/api/auth` 匹配 `/api/auth/login`，不匹配 `/api/authors`。
pub fn path_matches(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// 登录页地址，`returnUrl` 携带原始路径与查询串。
pub fn login_redirect(auth_path: &str, path: &str, query: Option<&str>) -> String {
    let return_url = match query.filter(|query| !query.is_empty()) {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let Ok(mut url) = Url::parse("http://localhost") else {
        return auth_path.to_string();
    };
    url.set_path(auth_path);
    url.query_pairs_mut().append_pair("returnUrl", &return_url);
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
