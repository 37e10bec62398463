//! 组合层面的集中度与风险评分，均为当前持仓的纯函数。

use folio_core::config::TRADING_DAYS_PER_YEAR;
use folio_core::portfolio::entity::Portfolio;
use std::collections::HashMap;

// 年化波动率达到该值时波动率评分为 100
const VOLATILITY_CEILING: f64 = 0.5;
const CONCENTRATION_BLEND: f64 = 0.5;

fn weights(portfolio: &Portfolio) -> Vec<f64> {
    if portfolio.total_value <= 0.0 {
        return Vec::new();
    }
    portfolio
        .holdings
        .iter()
        .map(|h| h.market_value() / portfolio.total_value)
        .filter(|w| *w > 0.0)
        .collect()
}

/// Herfindahl-Hirschman 指数 `Σ wᵢ²`。
pub fn herfindahl(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w * w).sum()
}

/// # Summary
/// 分散度评分 ∈ [0, 100]：`100 · (1 − HHI) / (1 − 1/n)`，持仓数 ≤ 1 时为 0。
pub fn diversification_score(portfolio: &Portfolio) -> f64 {
    let w = weights(portfolio);
    let n = w.len();
    if n <= 1 {
        return 0.0;
    }
    let max_spread = 1.0 - 1.0 / n as f64;
    (100.0 * (1.0 - herfindahl(&w)) / max_spread).clamp(0.0, 100.0)
}

/// # Summary
/// 集中度风险评分 ∈ [0, 100]：`100 · (0.6 · HHI + 0.4 · 最大权重)`，空组合为 0。
pub fn risk_score(portfolio: &Portfolio) -> f64 {
    let w = weights(portfolio);
    if w.is_empty() {
        return 0.0;
    }
    let max_weight = w.iter().copied().fold(0.0, f64::max);
    (100.0 * (0.6 * herfindahl(&w) + 0.4 * max_weight)).clamp(0.0, 100.0)
}

/// # Summary
/// 结合波动率的风险评分。
///
/// # Logic
/// 年化组合波动率按完全相关保守估计 `Σ wᵢ·volᵢ · sqrt(252)`，
/// 映射为 `min(σ / 0.5, 1) · 100` 后与集中度评分各占一半。
/// 缺少波动率的持仓按 0 计入。
pub fn risk_score_with_volatility(portfolio: &Portfolio, volatilities: &HashMap<String, f64>) -> f64 {
    let concentration = risk_score(portfolio);
    if portfolio.total_value <= 0.0 {
        return concentration;
    }
    let daily: f64 = portfolio
        .holdings
        .iter()
        .map(|h| {
            let w = h.market_value() / portfolio.total_value;
            w * volatilities.get(&h.symbol).copied().unwrap_or(0.0)
        })
        .sum();
    let annual = daily * TRADING_DAYS_PER_YEAR.sqrt();
    let volatility_score = (annual / VOLATILITY_CEILING).clamp(0.0, 1.0) * 100.0;
    (CONCENTRATION_BLEND * concentration + (1.0 - CONCENTRATION_BLEND) * volatility_score)
        .clamp(0.0, 100.0)
}
