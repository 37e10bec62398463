use async_trait::async_trait;
use folio_core::portfolio::entity::Portfolio;
use folio_core::portfolio::port::PortfolioStore;
use folio_core::store::error::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// # Summary
/// 基于内存的组合仓储实现。
///
/// 作为 `PortfolioStore` 的适配器，进程退出即丢失，主要用于测试与无盘运行。
pub struct MemoryPortfolioStore {
    portfolios: Arc<RwLock<HashMap<String, Portfolio>>>,
}

impl MemoryPortfolioStore {
    pub fn new() -> Self {
        Self {
            portfolios: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryPortfolioStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioStore for MemoryPortfolioStore {
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StoreError> {
        self.portfolios
            .write()
            .await
            .insert(portfolio.id.clone(), portfolio.clone());
        Ok(())
    }

    async fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError> {
        self.portfolios
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("portfolio {}", id)))
    }

    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, StoreError> {
        let guard = self.portfolios.read().await;
        let mut owned: Vec<Portfolio> = guard.values().filter(|p| p.owner == owner).cloned().collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn delete_portfolio(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let mut guard = self.portfolios.write().await;
        match guard.get(id) {
            Some(p) if p.owner == owner => {
                guard.remove(id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!(
                "portfolio {} owned by {}",
                id, owner
            ))),
        }
    }
}
