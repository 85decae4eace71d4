//! 管理员接口。
//!
//! - GET /api/admin/login-attempts/:user_id?limit=N

use api_contract::{ApiResponse, LoginAttemptDto, LoginAttemptQuery};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::utils::response::{bad_request_error, internal_auth_error, login_attempt_to_dto};

const DEFAULT_ATTEMPT_LIMIT: i64 = 50;

pub async fn list_login_attempts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LoginAttemptQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_ATTEMPT_LIMIT);
    if limit < 0 {
        return bad_request_error("limit must not be negative");
    }
    match state.auth.list_login_attempts(&user_id, limit).await {
        Ok(attempts) => {
            let items: Vec<LoginAttemptDto> =
                attempts.into_iter().map(login_attempt_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
        }
        Err(err) => internal_auth_error(err),
    }
}
