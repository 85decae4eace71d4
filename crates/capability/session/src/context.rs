//! 在任务范围内分发认证上下文。

use crate::reconciler::{AuthReconciler, Subscription};
use crate::state::AuthState;
use std::future::Future;
use std::ops::Deref;
use tokio::sync::watch;

tokio::task_local! {
    static AUTH_CONTEXT: AuthContext;
}

/// 认证上下文：协调器的共享句柄。
#[derive(Clone)]
pub struct AuthContext {
    reconciler: AuthReconciler,
}

impl AuthContext {
    pub fn state(&self) -> AuthState {
        self.reconciler.state()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.reconciler.watch()
    }
}

impl Deref for AuthContext {
    type Target = AuthReconciler;

    fn deref(&self) -> &Self::Target {
        &self.reconciler
    }
}

/// 上下文根：应用启动时构造一次，drop 或 `unmount` 时停止事件监听。
pub struct AuthProvider {
    context: AuthContext,
    subscription: Option<Subscription>,
}

impl AuthProvider {
    /// 订阅认证事件并完成首次协调。
    pub async fn mount(reconciler: AuthReconciler) -> Self {
        let subscription = reconciler.start().await;
        Self {
            context: AuthContext { reconciler },
            subscription: Some(subscription),
        }
    }

    pub fn context(&self) -> AuthContext {
        self.context.clone()
    }

    /// 在 `fut` 内可以通过 [`use_auth_context`] 取得上下文。
    pub async fn scope<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        AUTH_CONTEXT.scope(self.context.clone(), fut).await
    }

    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// 取得当前作用域的认证上下文。
///
/// # Panics
///
/// 不在 [`AuthProvider::scope`] 内调用时 panic。
pub fn use_auth_context() -> AuthContext {
    match try_auth_context() {
        Some(context) => context,
        None => panic!("useAuthContext must be used within an AuthProvider"),
    }
}

pub fn try_auth_context() -> Option<AuthContext> {
    AUTH_CONTEXT.try_with(AuthContext::clone).ok()
}
