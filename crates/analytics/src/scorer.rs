use folio_core::analysis::entity::AnalysisProfile;
use std::collections::{BTreeMap, HashSet};

/// 预测收益 × 置信度 的权重
pub const FORECAST_WEIGHT: f64 = 0.3;
pub const SHARPE_WEIGHT: f64 = 0.2;
pub const MOMENTUM_WEIGHT: f64 = 0.15;
pub const TECHNICAL_WEIGHT: f64 = 0.15;
pub const VOLATILITY_PENALTY: f64 = 0.2;
pub const CONFIDENCE_WEIGHT: f64 = 0.1;
/// 已持有标的的得分乘数，抑制不必要的换手
pub const HOLDING_BIAS: f64 = 1.1;

/// # Summary
/// 多因子综合得分。
///
/// # Logic
/// ```text
/// score = 0.3·(predictedReturn·confidence) + 0.2·tanh(0.5·sharpe)
///       + 0.15·tanh(2·momentum) + 0.15·(technical − 0.5)
///       − 0.2·volatility·(1 − riskTolerance) + 0.1·(confidence − 0.5)
/// ```
/// 已持有标的再乘以 1.1，最终截断为非负；非有限值记 0。
///
/// # Arguments
/// * `profile`: 标的画像。
/// * `risk_tolerance`: 风险偏好 ∈ [0, 1]，越高波动惩罚越轻。
/// * `is_holding`: 是否为当前持仓。
pub fn composite_score(profile: &AnalysisProfile, risk_tolerance: f64, is_holding: bool) -> f64 {
    let tolerance = risk_tolerance.clamp(0.0, 1.0);
    let confidence = profile.confidence_score;
    let raw = FORECAST_WEIGHT * (profile.predicted_return * confidence)
        + SHARPE_WEIGHT * (0.5 * profile.sharpe_ratio).tanh()
        + MOMENTUM_WEIGHT * (2.0 * profile.momentum_score).tanh()
        + TECHNICAL_WEIGHT * (profile.technical_score - 0.5)
        - VOLATILITY_PENALTY * profile.volatility * (1.0 - tolerance)
        + CONFIDENCE_WEIGHT * (confidence - 0.5);
    let biased = if is_holding { raw * HOLDING_BIAS } else { raw };
    if biased.is_finite() { biased.max(0.0) } else { 0.0 }
}

/// # Summary
/// 批量打分。
///
/// # Arguments
/// * `profiles`: 代码到画像的映射。
/// * `risk_tolerance`: 风险偏好。
/// * `holdings`: 当前持仓代码集合，用于施加持仓偏置。
pub fn score_profiles(
    profiles: &BTreeMap<String, AnalysisProfile>,
    risk_tolerance: f64,
    holdings: &HashSet<String>,
) -> BTreeMap<String, f64> {
    profiles
        .iter()
        .map(|(symbol, profile)| {
            let score = composite_score(profile, risk_tolerance, holdings.contains(symbol));
            (symbol.clone(), score)
        })
        .collect()
}
