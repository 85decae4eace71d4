//! Postgres 登录审计实现

use crate::error::StorageError;
use crate::traits::LoginAttemptStore;
use crate::validation::ensure_attempt;
use domain::{LoginAction, LoginAttempt};
use sqlx::{PgPool, Row};

pub struct PgLoginAttemptStore {
    pub pool: PgPool,
}

impl PgLoginAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LoginAttemptStore for PgLoginAttemptStore {
    async fn append(&self, attempt: LoginAttempt) -> Result<LoginAttempt, StorageError> {
        ensure_attempt(&attempt)?;
        sqlx::query(
            "insert into login_attempts \
             (attempt_id, user_id, ip_address, user_agent, success, action, ts) \
             values ($1, $2, $3, $4, $5, $6, to_timestamp($7 / 1000.0))",
        )
        .bind(&attempt.attempt_id)
        .bind(&attempt.user_id)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(attempt.action.as_str())
        .bind(attempt.ts_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<LoginAttempt>, StorageError> {
        let limit = if limit > 0 { Some(limit) } else { None };
        let rows = sqlx::query(
            "select attempt_id, user_id, ip_address, user_agent, success, action, \
             (extract(epoch from ts) * 1000)::bigint as ts_ms \
             from login_attempts \
             where user_id = $1 \
             order by ts desc \
             limit $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let action: String = row.try_get("action")?;
            let Some(action) = LoginAction::parse(&action) else {
                tracing::warn!(action = %action, "skipping login attempt with unknown action");
                continue;
            };
            items.push(LoginAttempt {
                attempt_id: row.try_get("attempt_id")?,
                user_id: row.try_get("user_id")?,
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
                success: row.try_get("success")?,
                action,
                ts_ms: row.try_get("ts_ms")?,
            });
        }
        Ok(items)
    }
}
