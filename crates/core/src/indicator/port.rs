use crate::indicator::entity::IndicatorFrame;
use crate::store::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// # Summary
/// 技术指标持久化接口。
///
/// # Invariants
/// - `replace_range` 必须是原子的"先删后插"：区间内旧数据全部丢弃，绝不合并。
/// - 对同一区间重复写入相同数据，结果幂等。
#[async_trait]
pub trait IndicatorStore: Send + Sync {
    /// # Summary
    /// 用新计算的指标整体替换 `[from, to]` 区间内的旧指标。
    ///
    /// # Logic
    /// 1. 删除该证券在区间内的所有指标。
    /// 2. 写入新的指标序列。
    ///
    /// # Arguments
    /// * `symbol`: 证券代码。
    /// * `from`: 区间起点（包含）。
    /// * `to`: 区间终点（包含）。
    /// * `frames`: 新的指标序列，日期均应落在区间内。
    ///
    /// # Returns
    /// 成功返回 Ok，失败返回 `StoreError`。
    async fn replace_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        frames: &[IndicatorFrame],
    ) -> Result<(), StoreError>;

    /// # Summary
    /// 按日期升序读取区间内的指标。
    async fn load_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndicatorFrame>, StoreError>;
}
