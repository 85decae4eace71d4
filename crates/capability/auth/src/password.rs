use crate::AuthError;
use argon2::{
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use subtle::ConstantTimeEq;

/// 新口令最短长度（与身份提供方默认策略一致）。
pub const MIN_PASSWORD_LEN: usize = 6;

/// 口令校验结果。
pub struct PasswordCheck {
    pub verified: bool,
    /// 通过迁移前的临时口令校验成功，调用方需要要求改密
    pub via_temp_password: bool,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(hash.to_string())
}

/// 校验口令：优先使用 argon2 哈希，未迁移的账户回退到临时口令。
///
/// 存在哈希时不再接受临时口令。
pub fn verify_credentials(
    password_hash: Option<&str>,
    temp_password: Option<&str>,
    password: &str,
) -> Result<PasswordCheck, AuthError> {
    if let Some(stored) = password_hash.filter(|value| !value.is_empty()) {
        return Ok(PasswordCheck {
            verified: verify_hash(stored, password)?,
            via_temp_password: false,
        });
    }

    let Some(temp) = temp_password.filter(|value| !value.is_empty()) else {
        return Ok(PasswordCheck {
            verified: false,
            via_temp_password: false,
        });
    };
    let verified: bool = temp.as_bytes().ct_eq(password.as_bytes()).into();
    Ok(PasswordCheck {
        verified,
        via_temp_password: verified,
    })
}

/// 校验 argon2 哈希。
pub fn verify_hash(stored_password_hash: &str, password: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_password_hash)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 新口令策略检查。
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }
    Ok(())
}
