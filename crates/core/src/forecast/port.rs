use crate::forecast::entity::Forecast;
use crate::forecast::error::ForecastError;
use async_trait::async_trait;

/// # Summary
/// 收益预测器接口（外部协作方，视为黑盒）。
///
/// # Invariants
/// - 每次调用只返回一个最佳可用预测。
/// - 返回错误表示"无法预测"，核心层将其视为剔除该标的而非致命失败。
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// # Summary
    /// 获取指定证券的当前预测。
    ///
    /// # Arguments
    /// * `symbol`: 证券代码。
    ///
    /// # Returns
    /// 成功返回 `Forecast`，无法预测时返回 `ForecastError`。
    async fn forecast(&self, symbol: &str) -> Result<Forecast, ForecastError>;
}
