//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 系统：/health（公开）、/metrics（仅管理员）
//! - 认证接口：/api/auth/*（公开，handler 自行校验 token）
//! - 受保护接口：/api/me、/api/admin/*、/api/retailer/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/api/auth/login", post(login))
        .route("/api/auth/login/username", post(login_with_username))
        .route("/api/auth/login/legacy", post(login_legacy))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/validate", get(validate_token))
        .route("/api/auth/password", post(change_password))
        .route("/api/auth/password/legacy", post(change_password_legacy))
        .route("/api/auth/password/reset", post(request_password_reset))
        .route("/api/me", get(me))
        .route("/api/admin/login-attempts/:user_id", get(list_login_attempts))
        .route("/api/retailer/profile", get(retailer_profile))
}
