//! 登录审计内存实现

use super::{lock_error, offline_error};
use crate::error::StorageError;
use crate::traits::LoginAttemptStore;
use crate::validation::ensure_attempt;
use domain::LoginAttempt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// 登录审计内存存储
pub struct InMemoryLoginAttemptStore {
    attempts: RwLock<Vec<LoginAttempt>>,
    offline: AtomicBool,
}

impl InMemoryLoginAttemptStore {
    pub fn new() -> Self {
        Self {
            attempts: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// 按追加顺序返回全部记录（测试辅助）。
    pub fn all(&self) -> Vec<LoginAttempt> {
        self.attempts
            .read()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    /// 模拟后端不可用。
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for InMemoryLoginAttemptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LoginAttemptStore for InMemoryLoginAttemptStore {
    async fn append(&self, attempt: LoginAttempt) -> Result<LoginAttempt, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        ensure_attempt(&attempt)?;
        let mut attempts = self.attempts.write().map_err(|_| lock_error())?;
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<LoginAttempt>, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        let limit = limit.max(0) as usize;
        let attempts = self.attempts.read().map_err(|_| lock_error())?;
        let mut items: Vec<LoginAttempt> = attempts
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        // 同一毫秒内按追加顺序倒序
        items.reverse();
        items.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
