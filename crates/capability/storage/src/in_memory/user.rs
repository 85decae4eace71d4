//! 用户内存存储实现
//!
//! 功能：
//! - 内置 admin 账户（用户名：admin，临时口令：admin123，需要改密）
//! - 按 id / 用户名查找、建档、登录计数、口令迁移

use super::{lock_error, offline_error};
use crate::error::StorageError;
use crate::models::{LoginLookup, NewUser, UserRecord};
use crate::traits::UserStore;
use crate::validation::ensure_new_user;
use domain::{Role, now_epoch_ms};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// 用户内存存储
///
/// 以 id 为键；用户名查找为线性扫描，数据量只在测试级别。
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    offline: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// 使用给定记录初始化。
    pub fn with_users(records: Vec<UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            users: RwLock::new(users),
            offline: AtomicBool::new(false),
        }
    }

    /// 内置 admin 账户（尚未迁移，使用临时口令）。
    pub fn with_default_admin() -> Self {
        let now = now_epoch_ms();
        Self::with_users(vec![UserRecord {
            id: "user-admin".to_string(),
            email: "admin@souk.dz".to_string(),
            username: "admin".to_string(),
            full_name: Some("Administrator".to_string()),
            phone: None,
            role: Role::Admin,
            retailer_id: None,
            is_active: true,
            preferred_language: "en".to_string(),
            last_login_at: None,
            login_count: 0,
            password_hash: None,
            temp_password: Some("admin123".to_string()),
            must_change_password: true,
            created_at: now,
            updated_at: now,
        }])
    }

    /// 模拟后端不可用。
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 当前用户数量（测试辅助）。
    pub fn len(&self) -> usize {
        self.users.read().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        Ok(())
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut UserRecord),
    {
        self.check_online()?;
        let mut users = self.users.write().map_err(|_| lock_error())?;
        match users.get_mut(user_id) {
            Some(record) => {
                apply(record);
                record.updated_at = now_epoch_ms();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        self.check_online()?;
        let users = self.users.read().map_err(|_| lock_error())?;
        Ok(users.get(user_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.check_online()?;
        let users = self.users.read().map_err(|_| lock_error())?;
        Ok(users
            .values()
            .find(|record| record.username == username)
            .cloned())
    }

    async fn get_user_for_login(
        &self,
        username: &str,
    ) -> Result<Option<LoginLookup>, StorageError> {
        Ok(self
            .find_by_username(username)
            .await?
            .as_ref()
            .map(LoginLookup::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError> {
        self.check_online()?;
        ensure_new_user(&user)?;
        let mut users = self.users.write().map_err(|_| lock_error())?;
        if users.contains_key(&user.id) {
            return Err(StorageError::new("user id already exists"));
        }
        if users.values().any(|record| record.username == user.username) {
            return Err(StorageError::new("username already exists"));
        }
        let now = now_epoch_ms();
        let record = UserRecord {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            phone: None,
            role: user.role,
            retailer_id: user.retailer_id,
            is_active: user.is_active,
            preferred_language: user.preferred_language,
            last_login_at: None,
            login_count: 0,
            password_hash: None,
            temp_password: None,
            must_change_password: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn record_login(&self, user_id: &str, at_ms: i64) -> Result<bool, StorageError> {
        self.update(user_id, |record| {
            record.last_login_at = Some(at_ms);
            record.login_count += 1;
        })
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        self.update(user_id, |record| {
            record.password_hash = Some(password_hash.to_string());
            record.temp_password = None;
            record.must_change_password = false;
        })
    }

    async fn set_must_change_password(
        &self,
        user_id: &str,
        must_change: bool,
    ) -> Result<bool, StorageError> {
        self.update(user_id, |record| {
            record.must_change_password = must_change;
        })
    }
}
