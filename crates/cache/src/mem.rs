use async_trait::async_trait;
use dashmap::DashMap;
use folio_core::cache::error::CacheError;
use folio_core::cache::port::Cache;
use tracing::debug;

/// # Summary
/// 基于 DashMap 的内存缓存实现。
///
/// # Invariants
/// - 所有操作均通过并发哈希表 `DashMap` 执行，保证多线程安全。
/// - 不提供自动过期或容量限制，失效由业务层显式调用 `del` / `del_prefix` 完成。
pub struct MemCache {
    // 线程安全的 KV 存储容器
    storage: DashMap<String, Vec<u8>>,
}

impl MemCache {
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// 当前缓存条目数。
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl Default for MemCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemCache {
    async fn set_raw(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.storage.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.storage.get(key).map(|v| v.value().clone()))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.storage.remove(key);
        Ok(())
    }

    /// # Summary
    /// 批量删除前缀匹配的键。
    ///
    /// # Logic
    /// 使用 `retain` 在分段锁内原地过滤，避免先收集键再逐个删除产生的竞态窗口。
    ///
    /// # Returns
    /// * `Result<usize, CacheError>` - 被删除的条目数量。
    async fn del_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let before = self.storage.len();
        self.storage.retain(|k, _| !k.starts_with(prefix));
        let removed = before.saturating_sub(self.storage.len());
        debug!("MemCache: evicted {} entries with prefix '{}'", removed, prefix);
        Ok(removed)
    }
}
