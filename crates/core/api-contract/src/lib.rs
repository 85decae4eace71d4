//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 邮箱 + 密码登录请求体（身份提供方主流程）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLoginRequest {
    pub email: String,
    pub password: String,
}

/// 用户名 + 密码登录请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameLoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录成功响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserDto,
    pub access_token: String,
    /// 过期时间（Unix 毫秒时间戳）
    pub expires_at: i64,
    pub requires_password_change: bool,
}

/// 旧版凭据登录响应体（不签发 token）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyLoginResponse {
    pub user: UserDto,
    pub requires_password_change: bool,
}

/// token 校验响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub user: Option<UserDto>,
}

/// 修改密码请求体（身份提供方校验当前会话）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

/// 旧版修改密码请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChangePasswordRequest {
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub current_password: String,
    pub new_password: String,
}

/// 找回密码请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub email: String,
    pub redirect_to: Option<String>,
}

/// 通用消息响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

/// 用户返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub retailer_id: Option<String>,
    pub is_active: bool,
    pub preferred_language: String,
    pub last_login_at: Option<i64>,
}

/// 零售商返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailerDto {
    pub id: String,
    pub business_name: String,
    pub city: Option<String>,
    pub status: String,
    pub credit_limit: f64,
    pub current_balance: f64,
}

/// 中间件注入的请求身份。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub role: String,
    pub retailer_id: Option<String>,
}

/// 登录审计返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptDto {
    pub attempt_id: String,
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub action: String,
    pub ts_ms: i64,
}

/// 登录审计查询参数。
#[derive(Debug, Default, Deserialize)]
pub struct LoginAttemptQuery {
    /// 最多返回条数，缺省 50；0 表示不限
    pub limit: Option<i64>,
}

/// 认证计数快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMetricsDto {
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
