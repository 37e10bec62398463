use crate::market::error::MarketError;
use thiserror::Error;

/// # Summary
/// 收益预测域错误枚举。
///
/// # Invariants
/// - 任何变体都表示"该标的无法预测"，批量分析时只剔除该标的，不终止整体流程。
#[derive(Error, Debug)]
pub enum ForecastError {
    // 预测器不可用或拒绝预测
    #[error("Forecast unavailable for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },
    // 历史数据不足以给出预测
    #[error("Insufficient history for {symbol}: required {required}, got {got}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        got: usize,
    },
    // 底层行情获取失败
    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}
