//! 输入验证辅助函数
//!
//! - normalize_required：验证必填字段，去除空格并检查非空
//! - normalize_optional：可选字段去除空格，空字符串视为未提供
//! - require_password：口令字段只检查非空，不去除空格

use crate::utils::response::bad_request_error;
use axum::response::Response;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 可选字段去除空格，空字符串视为未提供
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 口令可能包含首尾空格，只检查非空
pub fn require_password(value: String, field: &str) -> Result<String, Response> {
    if value.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(value)
}
