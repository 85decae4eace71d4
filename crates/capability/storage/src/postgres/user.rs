//! Postgres 用户存储实现
//!
//! 设计要点：
//! - 查询列集中在 `USER_COLUMNS`，时间戳换算为毫秒
//! - `get_user_for_login` 调用同名数据库函数

use crate::error::StorageError;
use crate::models::{LoginLookup, NewUser, UserRecord};
use crate::traits::UserStore;
use crate::validation::ensure_new_user;
use domain::Role;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const USER_COLUMNS: &str = "id, email, username, full_name, phone, role, retailer_id, is_active, \
     preferred_language, \
     (extract(epoch from last_login_at) * 1000)::bigint as last_login_at_ms, \
     login_count, password_hash, temp_password, must_change_password, \
     (extract(epoch from created_at) * 1000)::bigint as created_at_ms, \
     (extract(epoch from updated_at) * 1000)::bigint as updated_at_ms";

pub struct PgUserStore {
    pub pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 通过数据库 URL 建立连接池
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool =
            crate::connection::connect_pool(database_url, crate::DEFAULT_MAX_CONNECTIONS).await?;
        Ok(Self { pool })
    }

    async fn fetch_one_by(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let sql = format!("select {USER_COLUMNS} from users where {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, StorageError> {
    let role: String = row.try_get("role")?;
    let login_count: i32 = row.try_get("login_count")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        role: role.parse::<Role>()?,
        retailer_id: row.try_get("retailer_id")?,
        is_active: row.try_get("is_active")?,
        preferred_language: row.try_get("preferred_language")?,
        last_login_at: row.try_get("last_login_at_ms")?,
        login_count: i64::from(login_count),
        password_hash: row.try_get("password_hash")?,
        temp_password: row.try_get("temp_password")?,
        must_change_password: row.try_get("must_change_password")?,
        created_at: row.try_get("created_at_ms")?,
        updated_at: row.try_get("updated_at_ms")?,
    })
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        self.fetch_one_by("id", user_id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.fetch_one_by("username", username).await
    }

    async fn get_user_for_login(
        &self,
        username: &str,
    ) -> Result<Option<LoginLookup>, StorageError> {
        let row = sqlx::query(
            "select user_id, email, is_active, needs_migration from get_user_for_login($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(LoginLookup {
            user_id: row.try_get("user_id")?,
            email: row.try_get("email")?,
            is_active: row.try_get("is_active")?,
            needs_migration: row.try_get("needs_migration")?,
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError> {
        ensure_new_user(&user)?;
        let sql = format!(
            "insert into users \
             (id, email, username, full_name, role, retailer_id, is_active, preferred_language) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) \
             returning {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(&user.retailer_id)
            .bind(user.is_active)
            .bind(&user.preferred_language)
            .fetch_one(&self.pool)
            .await?;
        user_from_row(&row)
    }

    async fn record_login(&self, user_id: &str, at_ms: i64) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update users set last_login_at = to_timestamp($2 / 1000.0), \
             login_count = login_count + 1, updated_at = now() where id = $1",
        )
        .bind(user_id)
        .bind(at_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update users set password_hash = $2, temp_password = null, \
             must_change_password = false, updated_at = now() where id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_must_change_password(
        &self,
        user_id: &str,
        must_change: bool,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update users set must_change_password = $2, updated_at = now() where id = $1",
        )
        .bind(user_id)
        .bind(must_change)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
