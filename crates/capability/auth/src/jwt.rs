use crate::identity::IdentityError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// 本地身份提供方只签发 access token。
const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Serialize, Deserialize)]
/// JWT 内部 claims。
pub(crate) struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub exp: usize,
    pub token_type: String,
    /// 会话 id，登出时按它吊销
    pub jti: String,
}

/// 已签发的 access token。
pub struct IssuedToken {
    pub token: String,
    pub session_id: String,
    /// 过期时间（Unix 毫秒）
    pub expires_at: i64,
}

/// JWT 生成与校验。
pub struct JwtManager {
    secret: Vec<u8>,
    access_ttl_seconds: u64,
}

impl JwtManager {
    /// 创建 JWT 管理器。
    pub fn new(secret: String, access_ttl_seconds: u64) -> Self {
        Self {
            secret: secret.into_bytes(),
            access_ttl_seconds,
        }
    }

    /// 为身份账户签发 access token。
    pub fn issue(&self, subject: &str, email: Option<&str>) -> Result<IssuedToken, IdentityError> {
        let expires_at_seconds = now_epoch_seconds() + self.access_ttl_seconds;
        let session_id = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            exp: expires_at_seconds as usize,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            jti: session_id.clone(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|err| IdentityError::Backend(err.to_string()))?;
        Ok(IssuedToken {
            token,
            session_id,
            expires_at: (expires_at_seconds as i64).saturating_mul(1000),
        })
    }

    /// 解析并校验 access token（签名、过期、类型）。
    pub(crate) fn decode(&self, token: &str) -> Result<Claims, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let decoded = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(map_jwt_error)?;
        if decoded.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(IdentityError::InvalidToken);
        }
        Ok(decoded.claims)
    }
}

/// 当前时间戳（秒）。
fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 将 jwt 库错误映射为身份错误。
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> IdentityError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
        _ => IdentityError::InvalidToken,
    }
}
