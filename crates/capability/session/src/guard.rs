//! 路由守卫与角色门。
//!
//! 守卫本身是纯函数：输入协调后的状态，输出渲染结果。跳转副作用由
//! [`GuardController`] 在状态稳定后执行，同一结果只跳转一次。

use crate::state::AuthState;
use domain::Role;
use std::sync::Arc;
use tokio::sync::watch;

/// 守卫判定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// 协调尚未完成：显示加载占位，不跳转
    Loading,
    /// 跳转到指定路径，不渲染内容
    Redirect(String),
    /// 就地显示 "Access Denied"
    AccessDenied,
    Render,
}

pub trait Guard {
    fn evaluate(&self, state: &AuthState) -> GuardOutcome;
}

/// 受保护页面守卫。
#[derive(Debug, Clone)]
pub struct AuthGuard {
    require_auth: bool,
    require_admin: bool,
    require_retailer: bool,
    allowed_roles: Option<Vec<Role>>,
    redirect_to: String,
    unauthorized_to: String,
    inline_denied: bool,
}

impl AuthGuard {
    pub fn new() -> Self {
        Self {
            require_auth: true,
            require_admin: false,
            require_retailer: false,
            allowed_roles: None,
            redirect_to: "/login".to_string(),
            unauthorized_to: "/unauthorized".to_string(),
            inline_denied: false,
        }
    }

    pub fn require_auth(mut self, require: bool) -> Self {
        self.require_auth = require;
        self
    }

    pub fn require_admin(mut self) -> Self {
        self.require_admin = true;
        self
    }

    pub fn require_retailer(mut self) -> Self {
        self.require_retailer = true;
        self
    }

    pub fn allowed_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = Some(roles.into_iter().collect());
        self
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn unauthorized_to(mut self, path: impl Into<String>) -> Self {
        self.unauthorized_to = path.into();
        self
    }

    /// 角色不满足时就地显示拒绝页而不是跳转。
    pub fn inline_denied(mut self) -> Self {
        self.inline_denied = true;
        self
    }

    fn role_requirements_met(&self, state: &AuthState) -> bool {
        if self.require_admin && !state.is_admin() {
            return false;
        }
        if self.require_retailer && !state.is_retailer() {
            return false;
        }
        match &self.allowed_roles {
            Some(roles) => state
                .user()
                .is_some_and(|user| roles.contains(&user.role)),
            None => true,
        }
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard for AuthGuard {
    fn evaluate(&self, state: &AuthState) -> GuardOutcome {
        if state.is_loading() {
            return GuardOutcome::Loading;
        }
        if self.require_auth && !state.is_authenticated() {
            return GuardOutcome::Redirect(self.redirect_to.clone());
        }
        if !self.role_requirements_met(state) {
            if self.inline_denied {
                return GuardOutcome::AccessDenied;
            }
            return GuardOutcome::Redirect(self.unauthorized_to.clone());
        }
        GuardOutcome::Render
    }
}

/// 仅访客页面守卫（如登录页）：已登录时跳走。
#[derive(Debug, Clone)]
pub struct GuestGuard {
    redirect_to: String,
}

impl GuestGuard {
    pub fn new() -> Self {
        Self {
            redirect_to: "/dashboard".to_string(),
        }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }
}

impl Default for GuestGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard for GuestGuard {
    fn evaluate(&self, state: &AuthState) -> GuardOutcome {
        if state.is_loading() {
            return GuardOutcome::Loading;
        }
        if state.is_authenticated() {
            return GuardOutcome::Redirect(self.redirect_to.clone());
        }
        GuardOutcome::Render
    }
}

/// 导航副作用。
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str);
}

/// 把守卫判定转换为导航副作用；相同判定不会重复跳转。
pub struct GuardController<G> {
    guard: G,
    navigator: Arc<dyn Navigator>,
    last: Option<GuardOutcome>,
}

impl<G: Guard> GuardController<G> {
    pub fn new(guard: G, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            guard,
            navigator,
            last: None,
        }
    }

    /// 对一个状态求值，必要时跳转。
    pub fn apply(&mut self, state: &AuthState) -> GuardOutcome {
        let outcome = self.guard.evaluate(state);
        if let GuardOutcome::Redirect(to) = &outcome {
            if self.last.as_ref() != Some(&outcome) {
                tracing::debug!(to = %to, "guard redirect");
                self.navigator.navigate(to);
            }
        }
        self.last = Some(outcome.clone());
        outcome
    }

    /// 跟随状态通道直到发送端关闭。
    pub async fn follow(mut self, mut states: watch::Receiver<AuthState>) {
        loop {
            let state = states.borrow_and_update().clone();
            self.apply(&state);
            if states.changed().await.is_err() {
                break;
            }
        }
    }
}

/// 被守卫的内容。
pub trait Component {
    type Output;

    fn render(&self, state: &AuthState) -> Self::Output;
}

impl<F, R> Component for F
where
    F: Fn(&AuthState) -> R,
{
    type Output = R;

    fn render(&self, state: &AuthState) -> R {
        self(state)
    }
}

/// 渲染结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<R> {
    Loading,
    Redirect(String),
    AccessDenied,
    Content(R),
}

/// 守卫包装后的组件。
pub struct Guarded<G, C> {
    guard: G,
    component: C,
}

impl<G: Guard, C: Component> Guarded<G, C> {
    /// 判定未通过时不会调用组件。
    pub fn render(&self, state: &AuthState) -> Rendered<C::Output> {
        match self.guard.evaluate(state) {
            GuardOutcome::Loading => Rendered::Loading,
            GuardOutcome::Redirect(to) => Rendered::Redirect(to),
            GuardOutcome::AccessDenied => Rendered::AccessDenied,
            GuardOutcome::Render => Rendered::Content(self.component.render(state)),
        }
    }

    pub fn guard(&self) -> &G {
        &self.guard
    }
}

/// 用守卫包装组件。
pub fn with_auth<G: Guard, C: Component>(guard: G, component: C) -> Guarded<G, C> {
    Guarded { guard, component }
}
