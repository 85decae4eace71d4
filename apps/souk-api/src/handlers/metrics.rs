//! 系统接口。
//!
//! - GET /health
//! - GET /metrics（角色门限定管理员）

use api_contract::{ApiResponse, AuthMetricsDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use souk_telemetry::metrics;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(AuthMetricsDto {
            login_success: snapshot.login_success,
            login_failure: snapshot.login_failure,
            logout: snapshot.logout,
            password_change: snapshot.password_change,
            token_validation_failure: snapshot.token_validation_failure,
            middleware_pass: snapshot.middleware_pass,
            middleware_redirect: snapshot.middleware_redirect,
            middleware_forbidden: snapshot.middleware_forbidden,
            middleware_timeout: snapshot.middleware_timeout,
            reconcile_discarded: snapshot.reconcile_discarded,
        })),
    )
        .into_response()
}
