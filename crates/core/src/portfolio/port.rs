use crate::portfolio::entity::Portfolio;
use crate::store::error::StoreError;
use async_trait::async_trait;

/// # Summary
/// 组合持久化接口（外部协作方的标准 CRUD）。
///
/// # Invariants
/// - 核心层只负责计算字段，组合身份与归属逻辑由实现方维护。
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// # Summary
    /// 保存或整体覆盖组合（含全部持仓）。
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StoreError>;

    /// # Summary
    /// 读取组合。
    ///
    /// # Returns
    /// * `Result<Portfolio, StoreError>` - 不存在时返回 `StoreError::NotFound`。
    async fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError>;

    /// # Summary
    /// 列出某用户的全部组合。
    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, StoreError>;

    /// # Summary
    /// 删除组合，只允许归属用户执行。
    ///
    /// # Returns
    /// * `Result<(), StoreError>` - 组合不存在或不属于该用户时返回 `StoreError::NotFound`。
    async fn delete_portfolio(&self, owner: &str, id: &str) -> Result<(), StoreError>;
}
