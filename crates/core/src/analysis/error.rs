use crate::forecast::error::ForecastError;
use crate::market::error::MarketError;
use thiserror::Error;

/// # Summary
/// 分析与优化流程的错误分类。
///
/// # Invariants
/// - `InsufficientData` 与 `InstrumentUnavailable` 属于单标的错误，批量流程中只剔除该标的。
/// - `PortfolioState`、`ConstraintInfeasible` 与 `NoCandidates` 属于组合级错误，必须上报调用方并终止本次操作。
#[derive(Error, Debug)]
pub enum AnalysisError {
    // 价格点数不足以计算
    #[error("Insufficient data for {symbol}: required {required}, got {got}")]
    InsufficientData {
        symbol: String,
        required: usize,
        got: usize,
    },
    // 预测或行情获取失败
    #[error("Instrument {symbol} unavailable: {reason}")]
    InstrumentUnavailable { symbol: String, reason: String },
    // 组合状态不允许该操作 (例如总市值为 0)
    #[error("Portfolio state error: {0}")]
    PortfolioState(String),
    // 有候选但无一满足上下限，且没有持仓可退化
    #[error("Constraint infeasible: {0}")]
    ConstraintInfeasible(String),
    // 既无候选标的也无可退化的持仓
    #[error("No allocation candidates")]
    NoCandidates,
}

impl AnalysisError {
    /// 从预测错误构造单标的不可用错误。
    pub fn from_forecast(symbol: &str, err: &ForecastError) -> Self {
        AnalysisError::InstrumentUnavailable {
            symbol: symbol.to_string(),
            reason: err.to_string(),
        }
    }

    /// 从行情错误构造单标的不可用错误。
    pub fn from_market(symbol: &str, err: &MarketError) -> Self {
        AnalysisError::InstrumentUnavailable {
            symbol: symbol.to_string(),
            reason: err.to_string(),
        }
    }

    /// 是否为可被批量流程吸收的单标的错误。
    pub fn is_per_instrument(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. } | AnalysisError::InstrumentUnavailable { .. }
        )
    }
}
