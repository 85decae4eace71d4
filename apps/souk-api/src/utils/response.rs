//! HTTP 响应辅助函数和 DTO 转换
//!
//! 提供统一的错误响应构造函数和 DTO 转换函数：
//! - 错误响应：auth_error, forbidden_error, bad_request_error, not_found_error, internal_error, storage_error
//! - 认证结果映射：failure_response
//! - DTO 转换：user_to_dto, retailer_to_dto, login_attempt_to_dto
//!
//! 认证失败只下发通用文案，内部失败分类只决定状态码。

use api_contract::{ApiResponse, LoginAttemptDto, RetailerDto, UserDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{AppUser, LoginAttempt, Retailer};
use souk_auth::{AuthError, GENERIC_ERROR, LoginFailure};
use souk_storage::StorageError;

/// 认证错误响应
pub fn auth_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()>::error("AUTH.UNAUTHORIZED", message.into())),
    )
        .into_response()
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()>::error("AUTH.FORBIDDEN", "forbidden")),
    )
        .into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 内部错误响应；不下发底层错误细节
pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", GENERIC_ERROR)),
    )
        .into_response()
}

/// 认证内部错误响应
pub fn internal_auth_error(err: AuthError) -> Response {
    tracing::warn!(error = %err, "auth operation failed");
    internal_error()
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    tracing::warn!(error = %err, "storage operation failed");
    internal_error()
}

/// 按失败分类选择状态码，文案原样透传
pub fn failure_response(failure: Option<LoginFailure>, message: impl Into<String>) -> Response {
    match failure {
        Some(LoginFailure::Backend) => internal_error(),
        Some(LoginFailure::WeakPassword) => bad_request_error(message),
        _ => auth_error(StatusCode::UNAUTHORIZED, message),
    }
}

/// AppUser 转 UserDto
pub fn user_to_dto(user: AppUser) -> UserDto {
    UserDto {
        id: user.id,
        email: user.email,
        username: user.username,
        full_name: user.full_name,
        role: user.role.as_str().to_string(),
        retailer_id: user.retailer_id,
        is_active: user.is_active,
        preferred_language: user.preferred_language,
        last_login_at: user.last_login_at,
    }
}

/// Retailer 转 RetailerDto
pub fn retailer_to_dto(retailer: Retailer) -> RetailerDto {
    RetailerDto {
        id: retailer.id,
        business_name: retailer.business_name,
        city: retailer.address.city,
        status: retailer.status.as_str().to_string(),
        credit_limit: retailer.credit_limit,
        current_balance: retailer.current_balance,
    }
}

/// LoginAttempt 转 LoginAttemptDto
pub fn login_attempt_to_dto(attempt: LoginAttempt) -> LoginAttemptDto {
    LoginAttemptDto {
        attempt_id: attempt.attempt_id,
        user_id: attempt.user_id,
        ip_address: attempt.ip_address,
        user_agent: attempt.user_agent,
        success: attempt.success,
        action: attempt.action.as_str().to_string(),
        ts_ms: attempt.ts_ms,
    }
}
