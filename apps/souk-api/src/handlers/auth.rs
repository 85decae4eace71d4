//! 认证相关 HTTP 接口
//!
//! - POST /api/auth/login：邮箱 + 口令，经身份提供方登录
//! - POST /api/auth/login/username：用户名解析邮箱后走身份提供方登录
//! - POST /api/auth/login/legacy：旧版凭据校验，不签发 token
//! - POST /api/auth/logout
//! - GET  /api/auth/validate
//! - POST /api/auth/password：持有会话 token 改密
//! - POST /api/auth/password/legacy：校验当前口令后改密
//! - POST /api/auth/password/reset：找回口令邮件，总是返回成功
//!
//! 这些路径都是公开路径，token 由 handler 自行提取与校验。

use api_contract::{
    ApiResponse, ChangePasswordRequest, EmailLoginRequest, LegacyChangePasswordRequest,
    LegacyLoginResponse, LoginResponse, MessageResponse, PasswordResetRequest,
    UsernameLoginRequest, ValidateTokenResponse,
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use souk_auth::{INVALID_TOKEN, LoginFailure, LoginResult};

use crate::AppState;
use crate::middleware::{client_info, request_token};
use crate::utils::response::{auth_error, failure_response, internal_error, user_to_dto};
use crate::utils::validation::{normalize_optional, normalize_required, require_password};

/// 邮箱登录
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EmailLoginRequest>,
) -> Response {
    let email = match normalize_required(req.email, "email") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let password = match require_password(req.password, "password") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let result = state
        .auth
        .login_with_supabase(&email, &password, &client_info(&headers))
        .await;
    login_response(result)
}

/// 用户名登录
pub async fn login_with_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UsernameLoginRequest>,
) -> Response {
    let username = match normalize_required(req.username, "username") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let password = match require_password(req.password, "password") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let result = state
        .auth
        .login_with_username(&username, &password, &client_info(&headers))
        .await;
    login_response(result)
}

/// 旧版凭据登录
pub async fn login_legacy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UsernameLoginRequest>,
) -> Response {
    let username = match normalize_required(req.username, "username") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let password = match require_password(req.password, "password") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let result = state
        .auth
        .login_with_credentials(&username, &password, &client_info(&headers))
        .await;
    match (result.success, result.user) {
        (true, Some(user)) => {
            let response = LegacyLoginResponse {
                user: user_to_dto(user),
                requires_password_change: result.requires_password_change,
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        _ => failure_response(result.failure, result.message.unwrap_or_default()),
    }
}

/// 登出；没有 token 时返回 401
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = request_token(&headers) else {
        return auth_error(StatusCode::UNAUTHORIZED, INVALID_TOKEN);
    };
    let result = state.auth.logout_supabase(token, &client_info(&headers)).await;
    if !result.success {
        return internal_error();
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(MessageResponse {
            message: result.message,
        })),
    )
        .into_response()
}

/// 校验当前 token 并返回应用用户
pub async fn validate_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = request_token(&headers) else {
        return auth_error(StatusCode::UNAUTHORIZED, INVALID_TOKEN);
    };
    let validation = state.auth.validate_token(token).await;
    match (validation.valid, validation.user) {
        (true, Some(user)) => {
            let response = ValidateTokenResponse {
                valid: true,
                user: Some(user_to_dto(user)),
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        _ => match validation.failure {
            Some(LoginFailure::Backend) => internal_error(),
            _ => auth_error(
                StatusCode::UNAUTHORIZED,
                validation.error.unwrap_or_else(|| INVALID_TOKEN.to_string()),
            ),
        },
    }
}

/// 持有会话 token 改密
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Response {
    let Some(token) = request_token(&headers) else {
        return auth_error(StatusCode::UNAUTHORIZED, INVALID_TOKEN);
    };
    let result = state
        .auth
        .change_password_supabase(token, &req.new_password, &client_info(&headers))
        .await;
    if !result.success {
        return failure_response(result.failure, result.message);
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(MessageResponse {
            message: result.message,
        })),
    )
        .into_response()
}

/// 旧版改密
pub async fn change_password_legacy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LegacyChangePasswordRequest>,
) -> Response {
    let user_id = match normalize_required(req.user_id, "userId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let result = state
        .auth
        .change_password(
            &user_id,
            &req.current_password,
            &req.new_password,
            &client_info(&headers),
        )
        .await;
    if !result.success {
        return failure_response(result.failure, result.message);
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(MessageResponse {
            message: result.message,
        })),
    )
        .into_response()
}

/// 找回口令；不暴露邮箱是否存在
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Response {
    let email = match normalize_required(req.email, "email") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let redirect_to = normalize_optional(req.redirect_to);
    let result = state
        .auth
        .request_password_reset(&email, redirect_to.as_deref())
        .await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(MessageResponse {
            message: result.message,
        })),
    )
        .into_response()
}

fn login_response(result: LoginResult) -> Response {
    match (result.success, result.user, result.token) {
        (true, Some(user), Some(access_token)) => {
            let response = LoginResponse {
                user: user_to_dto(user),
                access_token,
                expires_at: result.expires_at.unwrap_or_default(),
                requires_password_change: result.requires_password_change,
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        _ => failure_response(result.failure, result.message.unwrap_or_default()),
    }
}
