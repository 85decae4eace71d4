//! 追踪、请求 ID 与认证计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 认证计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthMetricsSnapshot {
    pub login_success: u64,
    pub login_failure: u64,
    pub logout: u64,
    pub password_change: u64,
    pub token_validation_failure: u64,
    pub middleware_pass: u64,
    pub middleware_redirect: u64,
    pub middleware_forbidden: u64,
    pub middleware_timeout: u64,
    pub reconcile_discarded: u64,
}

/// 认证计数。
pub struct AuthMetrics {
    login_success: AtomicU64,
    login_failure: AtomicU64,
    logout: AtomicU64,
    password_change: AtomicU64,
    token_validation_failure: AtomicU64,
    middleware_pass: AtomicU64,
    middleware_redirect: AtomicU64,
    middleware_forbidden: AtomicU64,
    middleware_timeout: AtomicU64,
    reconcile_discarded: AtomicU64,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self {
            login_success: AtomicU64::new(0),
            login_failure: AtomicU64::new(0),
            logout: AtomicU64::new(0),
            password_change: AtomicU64::new(0),
            token_validation_failure: AtomicU64::new(0),
            middleware_pass: AtomicU64::new(0),
            middleware_redirect: AtomicU64::new(0),
            middleware_forbidden: AtomicU64::new(0),
            middleware_timeout: AtomicU64::new(0),
            reconcile_discarded: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        AuthMetricsSnapshot {
            login_success: self.login_success.load(Ordering::Relaxed),
            login_failure: self.login_failure.load(Ordering::Relaxed),
            logout: self.logout.load(Ordering::Relaxed),
            password_change: self.password_change.load(Ordering::Relaxed),
            token_validation_failure: self.token_validation_failure.load(Ordering::Relaxed),
            middleware_pass: self.middleware_pass.load(Ordering::Relaxed),
            middleware_redirect: self.middleware_redirect.load(Ordering::Relaxed),
            middleware_forbidden: self.middleware_forbidden.load(Ordering::Relaxed),
            middleware_timeout: self.middleware_timeout.load(Ordering::Relaxed),
            reconcile_discarded: self.reconcile_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for AuthMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<AuthMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static AuthMetrics {
    METRICS.get_or_init(AuthMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录登录结果。
pub fn record_login(success: bool) {
    let metrics = metrics();
    if success {
        metrics.login_success.fetch_add(1, Ordering::Relaxed);
    } else {
        metrics.login_failure.fetch_add(1, Ordering::Relaxed);
    }
}

/// 记录登出次数。
pub fn record_logout() {
    metrics().logout.fetch_add(1, Ordering::Relaxed);
}

/// 记录改密成功次数。
pub fn record_password_change() {
    metrics().password_change.fetch_add(1, Ordering::Relaxed);
}

/// 记录 token 校验失败次数。
pub fn record_token_validation_failure() {
    metrics()
        .token_validation_failure
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录中间件放行（公开路径或授权成功）。
pub fn record_middleware_pass() {
    metrics().middleware_pass.fetch_add(1, Ordering::Relaxed);
}

/// 记录中间件重定向到登录页。
pub fn record_middleware_redirect() {
    metrics().middleware_redirect.fetch_add(1, Ordering::Relaxed);
}

/// 记录中间件 403。
pub fn record_middleware_forbidden() {
    metrics().middleware_forbidden.fetch_add(1, Ordering::Relaxed);
}

/// 记录中间件外部调用超时。
pub fn record_middleware_timeout() {
    metrics().middleware_timeout.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的过期会话协调结果。
pub fn record_reconcile_discarded() {
    metrics().reconcile_discarded.fetch_add(1, Ordering::Relaxed);
}
