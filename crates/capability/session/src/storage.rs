//! token 与用户缓存存储。
//!
//! token 同时写入短期 cookie（服务端渲染可读）与持久存储；读取时 cookie 优先。
//! 用户对象只写持久存储，用于刷新页面后在网络往返完成前先渲染。

use crate::SessionError;
use domain::{AppUser, now_epoch_ms};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_DATA_KEY: &str = "user_data";

/// cookie 默认有效期 7 天。
pub const DEFAULT_COOKIE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 键值存储后端。
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

fn lock_error() -> SessionError {
    SessionError::Backend("lock failed".to_string())
}

/// 进程内持久存储替身。
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries
            .write()
            .map_err(|_| lock_error())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().map_err(|_| lock_error())?.remove(key);
        Ok(())
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// 带 max-age 的 cookie 存储。
pub struct CookieBackend {
    /// 值与过期时间（Unix 毫秒）
    jar: RwLock<HashMap<String, (String, i64)>>,
    max_age: Duration,
    clock: Clock,
}

impl CookieBackend {
    pub fn new(max_age: Duration) -> Self {
        Self::with_clock(max_age, Arc::new(now_epoch_ms))
    }

    /// 注入时钟（毫秒），用于测试过期。
    pub fn with_clock(max_age: Duration, clock: Clock) -> Self {
        Self {
            jar: RwLock::new(HashMap::new()),
            max_age,
            clock,
        }
    }
}

impl Default for CookieBackend {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_MAX_AGE)
    }
}

impl StorageBackend for CookieBackend {
    fn get(&self, key: &str) -> Option<String> {
        let jar = self.jar.read().ok()?;
        let (value, expires_at) = jar.get(key)?;
        if (self.clock)() >= *expires_at {
            return None;
        }
        Some(value.clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let max_age_ms = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        let expires_at = (self.clock)().saturating_add(max_age_ms);
        self.jar
            .write()
            .map_err(|_| lock_error())?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.jar.write().map_err(|_| lock_error())?.remove(key);
        Ok(())
    }
}

/// JSON 文件存储，进程重启后保留。
pub struct FileBackend {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }

    fn modify<F>(&self, apply: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.guard.lock().map_err(|_| lock_error())?;
        let mut entries = self.load()?;
        apply(&mut entries);
        self.save(&entries)
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.guard.lock().ok()?;
        match self.load() {
            Ok(entries) => entries.get(key).cloned(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "unreadable session file");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}

/// token / 用户缓存。
///
/// 所有操作都不返回错误：写入失败记日志，读取失败视为不存在。
#[derive(Clone)]
pub struct TokenStorage {
    cookie: Option<Arc<dyn StorageBackend>>,
    persistent: Option<Arc<dyn StorageBackend>>,
}

impl TokenStorage {
    pub fn new(cookie: Arc<dyn StorageBackend>, persistent: Arc<dyn StorageBackend>) -> Self {
        Self {
            cookie: Some(cookie),
            persistent: Some(persistent),
        }
    }

    /// 默认 cookie + 内存持久存储。
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(CookieBackend::default()),
            Arc::new(MemoryBackend::new()),
        )
    }

    /// 没有可用存储的环境：读取总是为空，写入被忽略。
    pub fn detached() -> Self {
        Self {
            cookie: None,
            persistent: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.cookie.is_some() || self.persistent.is_some()
    }

    pub fn store_auth_token(&self, token: &str) {
        for backend in self.backends() {
            if let Err(err) = backend.set(AUTH_TOKEN_KEY, token) {
                tracing::warn!(error = %err, "failed to store auth token");
            }
        }
    }

    /// cookie 优先，其次持久存储。
    pub fn get_auth_token(&self) -> Option<String> {
        self.backends()
            .find_map(|backend| backend.get(AUTH_TOKEN_KEY))
            .filter(|token| !token.is_empty())
    }

    pub fn remove_auth_token(&self) {
        for backend in self.backends() {
            if let Err(err) = backend.remove(AUTH_TOKEN_KEY) {
                tracing::warn!(error = %err, "failed to remove auth token");
            }
        }
    }

    pub fn store_user_data(&self, user: &AppUser) {
        let Some(persistent) = &self.persistent else {
            return;
        };
        let result = serde_json::to_string(user)
            .map_err(SessionError::from)
            .and_then(|raw| persistent.set(USER_DATA_KEY, &raw));
        if let Err(err) = result {
            tracing::warn!(user_id = %user.id, error = %err, "failed to cache user data");
        }
    }

    /// 缓存损坏时返回 None。
    pub fn get_user_data(&self) -> Option<AppUser> {
        let raw = self.persistent.as_ref()?.get(USER_DATA_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed cached user data");
                None
            }
        }
    }

    /// 清除 token 与用户缓存。
    pub fn clear_auth_data(&self) {
        self.remove_auth_token();
        if let Some(persistent) = &self.persistent {
            if let Err(err) = persistent.remove(USER_DATA_KEY) {
                tracing::warn!(error = %err, "failed to remove cached user data");
            }
        }
    }

    fn backends(&self) -> impl Iterator<Item = &Arc<dyn StorageBackend>> {
        self.cookie.iter().chain(self.persistent.iter())
    }
}
