use crate::indicator::{STABLE_HISTORY, compute_frames, technical_score};
use crate::risk::{daily_returns, momentum, sharpe_ratio, volatility};
use folio_core::analysis::entity::AnalysisProfile;
use folio_core::analysis::error::AnalysisError;
use folio_core::config::AnalyticsConfig;
use folio_core::forecast::entity::Forecast;
use folio_core::market::entity::{PriceBar, closes};
use tracing::debug;

/// 构建画像所需的最少价格点 (至少一个收益率)
pub const MIN_PROFILE_POINTS: usize = 2;

/// # Summary
/// 由一段历史行情与一个预测构建单标的风险收益画像。
///
/// # Logic
/// 1. 价格点不足 2 个时返回 `InsufficientData`，由批量流程剔除该标的。
/// 2. 计算日收益率、波动率、夏普比率与动量。
/// 3. 在内存中计算指标帧，以最新一帧推导技术面得分（不落库）。
/// 4. 预测涨跌幅与置信度换算为小数。
///
/// # Arguments
/// * `symbol`: 证券代码。
/// * `bars`: 按日期升序的日线。
/// * `forecast`: 该标的的当前预测。
/// * `config`: 分析参数（无风险利率、动量窗口）。
///
/// # Returns
/// 成功返回 `AnalysisProfile`，数据不足返回 `AnalysisError::InsufficientData`。
pub fn build_profile(
    symbol: &str,
    bars: &[PriceBar],
    forecast: &Forecast,
    config: &AnalyticsConfig,
) -> Result<AnalysisProfile, AnalysisError> {
    if bars.len() < MIN_PROFILE_POINTS {
        return Err(AnalysisError::InsufficientData {
            symbol: symbol.to_string(),
            required: MIN_PROFILE_POINTS,
            got: bars.len(),
        });
    }
    if bars.len() < STABLE_HISTORY {
        debug!(
            "Profile for {} built from {} bars; long-window indicators use fallbacks",
            symbol,
            bars.len()
        );
    }

    let prices = closes(bars);
    let returns = daily_returns(&prices);
    let frames = compute_frames(symbol, bars);
    let technical = frames.last().map(technical_score).unwrap_or(0.5);
    let current_price = prices.last().copied().unwrap_or(forecast.current_price);

    Ok(AnalysisProfile {
        symbol: symbol.to_string(),
        current_price,
        predicted_return: forecast.predicted_return(),
        volatility: volatility(&returns),
        sharpe_ratio: sharpe_ratio(&returns, config.daily_risk_free_rate()),
        confidence_score: forecast.confidence(),
        momentum_score: momentum(&prices, config.momentum_window),
        technical_score: technical,
        historical_returns: returns,
    })
}
