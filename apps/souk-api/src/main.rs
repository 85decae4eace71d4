//! Souk 认证 HTTP 服务：身份登录、token 校验、改密与中间件授权。

mod handlers;
mod middleware;
mod routes;
mod utils;

use axum::{Router, middleware as axum_middleware};
use domain::Role;
use souk_auth::{
    AuthService, Authorizer, AuthorizerOptions, IdentityProvider, JwtManager,
    LocalIdentityProvider, RemoteIdentityProvider, RoleAccess,
};
use souk_config::{AppConfig, IdentityMode};
use souk_storage::{
    DEFAULT_MAX_CONNECTIONS, InMemoryLoginAttemptStore, InMemoryRetailerStore, InMemoryUserStore,
    LoginAttemptStore, PgLoginAttemptStore, PgRetailerStore, PgUserStore, RetailerStore,
    UserStore, connect_pool,
};
use souk_telemetry::init_tracing;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 开发模式内置管理员（与内存用户表的默认管理员一致）
const DEV_ADMIN_ID: &str = "user-admin";
const DEV_ADMIN_EMAIL: &str = "admin@souk.dz";
const DEV_ADMIN_PASSWORD: &str = "admin123";

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub authorizer: Arc<Authorizer>,
    pub retailers: Arc<dyn RetailerStore>,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        retailers: Arc<dyn RetailerStore>,
        attempts: Arc<dyn LoginAttemptStore>,
        options: AuthorizerOptions,
    ) -> Self {
        let auth = Arc::new(AuthService::new(identity.clone(), users.clone(), attempts));
        let authorizer = Arc::new(Authorizer::new(identity, users, options));
        Self {
            auth,
            authorizer,
            retailers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let options = authorizer_options(&config);
    let (users, retailers, attempts): (
        Arc<dyn UserStore>,
        Arc<dyn RetailerStore>,
        Arc<dyn LoginAttemptStore>,
    ) = match &config.database_url {
        Some(database_url) => {
            // Postgres 存储（需先执行 migrations）
            let pool = connect_pool(database_url, DEFAULT_MAX_CONNECTIONS).await?;
            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgRetailerStore::new(pool.clone())),
                Arc::new(PgLoginAttemptStore::new(pool)),
            )
        }
        None => {
            tracing::warn!("SOUK_DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(InMemoryUserStore::with_default_admin()),
                Arc::new(InMemoryRetailerStore::new()),
                Arc::new(InMemoryLoginAttemptStore::new()),
            )
        }
    };

    let identity: Arc<dyn IdentityProvider> = match config.identity_mode {
        IdentityMode::Remote => Arc::new(RemoteIdentityProvider::new(
            config.identity_url.clone(),
            config.identity_anon_key.clone(),
        )),
        IdentityMode::Local => {
            let local = LocalIdentityProvider::new(
                JwtManager::new(config.jwt_secret.clone(), config.access_ttl_seconds),
                format!("http://{}", config.http_addr),
            );
            local.register_with_id(DEV_ADMIN_ID, DEV_ADMIN_EMAIL, Some(DEV_ADMIN_PASSWORD))?;
            tracing::info!(email = DEV_ADMIN_EMAIL, "local identity provider seeded");
            Arc::new(local)
        }
    };

    let state = AppState::new(identity, users, retailers, attempts, options);
    let app = build_app(state);

    tracing::info!(addr = %config.http_addr, "souk-api listening");
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// 组装路由与中间件：request_context 最外层，其次请求日志，最后授权。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::request_context))
}

/// 角色门：管理接口与指标只对管理员开放，零售商接口只对零售商开放。
pub fn default_role_access() -> RoleAccess {
    RoleAccess::new()
        .allow("/api/admin", [Role::Admin])
        .allow("/metrics", [Role::Admin])
        .allow("/api/retailer", [Role::Retailer])
}

fn authorizer_options(config: &AppConfig) -> AuthorizerOptions {
    AuthorizerOptions {
        public_paths: config.public_paths.clone(),
        auth_path: config.auth_path.clone(),
        protected_paths: Vec::new(),
        role_access: default_role_access(),
        timeout: config.auth_timeout,
    }
}
