//! 受保护的账户接口。
//!
//! - GET /api/me：回显中间件注入的身份
//! - GET /api/retailer/profile：当前零售商档案（仅零售商角色）

use api_contract::{ApiResponse, MeResponse};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use souk_storage::RetailerStore;

use crate::AppState;
use crate::middleware::{RETAILER_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::utils::response::{auth_error, not_found_error, retailer_to_dto, storage_error};

pub async fn me(headers: HeaderMap) -> Response {
    let (Some(user_id), Some(role)) = (
        header_str(&headers, USER_ID_HEADER),
        header_str(&headers, USER_ROLE_HEADER),
    ) else {
        return auth_error(StatusCode::UNAUTHORIZED, "unauthorized");
    };
    let response = MeResponse {
        user_id: user_id.to_string(),
        role: role.to_string(),
        retailer_id: header_str(&headers, RETAILER_ID_HEADER).map(str::to_string),
    };
    (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
}

pub async fn retailer_profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(retailer_id) = header_str(&headers, RETAILER_ID_HEADER) else {
        return not_found_error();
    };
    match state.retailers.find_retailer(retailer_id).await {
        Ok(Some(retailer)) => (
            StatusCode::OK,
            Json(ApiResponse::success(retailer_to_dto(retailer))),
        )
            .into_response(),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
