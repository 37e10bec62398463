use crate::market::entity::PriceBar;
use crate::market::error::MarketError;
use async_trait::async_trait;
use chrono::NaiveDate;

/// # Summary
/// 历史日线行情提供者接口（外部协作方）。
///
/// # Invariants
/// - 返回结果必须按日期升序排列，不做任何合成补齐。
/// - 区间内无数据时返回空列表，而不是错误。
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// # Summary
    /// 获取特定证券在闭区间 `[from, to]` 内的日线数据。
    ///
    /// # Arguments
    /// * `symbol`: 证券代码。
    /// * `from`: 开始日期（包含）。
    /// * `to`: 结束日期（包含）。
    ///
    /// # Returns
    /// 成功返回有序日线列表，数据源故障返回 `MarketError`。
    async fn get_price_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, MarketError>;
}
