//! 认证和授权中间件
//!
//! 提供以下中间件和辅助函数：
//! - request_context：请求上下文中间件，注入 request_id/trace_id
//! - authorize：把 `Authorizer` 的决策映射为放行、307 跳转、403 或身份头注入
//! - bearer_token / cookie_token / request_token：提取访问 token
//! - client_info：提取客户端 IP 与 user agent 用于登录审计
//!
//! 认证流程：
//! 1. request_context：在所有请求前注入追踪 ID
//! 2. authorize：公开路径直接放行；受保护路径校验 token、应用用户与角色
//! 3. 下游 handler 从 `x-user-id`/`x-user-role`/`x-retailer-id` 读取身份

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use domain::RequestIdentity;
use souk_auth::{AuthRequest, AuthorizationDecision, ClientInfo, SESSION_COOKIE};
use souk_telemetry::new_request_ids;
use tracing::{Instrument, info_span};

use crate::AppState;
use crate::utils::response::forbidden_error;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const RETAILER_ID_HEADER: &str = "x-retailer-id";

const IDENTITY_HEADERS: [&str; 3] = [USER_ID_HEADER, USER_ROLE_HEADER, RETAILER_ID_HEADER];

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

/// 授权中间件
///
/// 外部传入的身份头总是先被移除，只有授权通过时才重新注入。
pub async fn authorize(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let auth_request = AuthRequest {
        path: req.uri().path().to_string(),
        query: req.uri().query().map(str::to_string),
        cookie_token: cookie_token(req.headers()).map(str::to_string),
        bearer_token: bearer_token(req.headers()).map(str::to_string),
    };
    strip_identity_headers(req.headers_mut());

    match state.authorizer.authorize(&auth_request).await {
        AuthorizationDecision::Pass => next.run(req).await,
        AuthorizationDecision::Redirect { location } => {
            Redirect::temporary(&location).into_response()
        }
        AuthorizationDecision::Forbidden { .. } => forbidden_error(),
        AuthorizationDecision::Authorized(identity) => {
            inject_identity_headers(req.headers_mut(), &identity);
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
    }
}

/// 从请求头中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(header::AUTHORIZATION)?;
    let auth_str = header_value.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

/// 从 Cookie 头中提取会话 token
pub fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// 会话 token：cookie 优先，其次 Bearer
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

/// 客户端信息：IP 取 `x-forwarded-for` 第一跳，缺失记为 "unknown"
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown");
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    ClientInfo::new(ip, user_agent)
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in IDENTITY_HEADERS {
        headers.remove(name);
    }
}

fn inject_identity_headers(headers: &mut HeaderMap, identity: &RequestIdentity) {
    if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
        headers.insert(USER_ID_HEADER, value);
    }
    headers.insert(
        USER_ROLE_HEADER,
        HeaderValue::from_static(identity.role.as_str()),
    );
    if let Some(retailer_id) = &identity.retailer_id {
        if let Ok(value) = HeaderValue::from_str(retailer_id) {
            headers.insert(RETAILER_ID_HEADER, value);
        }
    }
}
