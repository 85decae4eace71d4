pub mod audit;
pub mod retailer;
pub mod user;

pub use audit::{LoginAction, LoginAttempt, UNKNOWN_USER_ID};
pub use retailer::{Retailer, RetailerAddress, RetailerStatus};
pub use user::{AppUser, AuthMode, RequestIdentity, Role, RoleParseError};

use std::time::{SystemTime, UNIX_EPOCH};

/// 当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default()
}
