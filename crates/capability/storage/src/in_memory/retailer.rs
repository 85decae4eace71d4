//! 零售商内存存储实现

use super::{lock_error, offline_error};
use crate::error::StorageError;
use crate::traits::RetailerStore;
use domain::Retailer;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// 零售商内存存储
pub struct InMemoryRetailerStore {
    retailers: RwLock<HashMap<String, Retailer>>,
    offline: AtomicBool,
}

impl InMemoryRetailerStore {
    pub fn new() -> Self {
        Self::with_retailers(Vec::new())
    }

    pub fn with_retailers(records: Vec<Retailer>) -> Self {
        let retailers = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            retailers: RwLock::new(retailers),
            offline: AtomicBool::new(false),
        }
    }

    /// 插入或覆盖（测试与开发数据）。
    pub fn insert(&self, retailer: Retailer) -> Result<(), StorageError> {
        let mut retailers = self.retailers.write().map_err(|_| lock_error())?;
        retailers.insert(retailer.id.clone(), retailer);
        Ok(())
    }

    /// 模拟后端不可用。
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for InMemoryRetailerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RetailerStore for InMemoryRetailerStore {
    async fn find_retailer(&self, retailer_id: &str) -> Result<Option<Retailer>, StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        let retailers = self.retailers.read().map_err(|_| lock_error())?;
        Ok(retailers.get(retailer_id).cloned())
    }
}
