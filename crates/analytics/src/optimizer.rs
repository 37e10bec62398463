use crate::risk::correlation_matrix;
use folio_core::analysis::entity::{AllocationPlan, AllocationStrategy, AnalysisProfile};
use folio_core::analysis::error::AnalysisError;
use folio_core::config::AnalyticsConfig;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 权重之和允许的偏差
pub const WEIGHT_TOLERANCE: f64 = 1e-2;
const EPS: f64 = 1e-12;
const PROJECTION_STEPS: usize = 100;

/// # Summary
/// 优化器参数，从 `AnalyticsConfig` 派生。
///
/// # Invariants
/// - `0 <= min_allocation <= max_allocation <= 1`。
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub min_allocation: f64,
    pub max_allocation: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    pub epsilon: f64,
    pub convergence_tolerance: Option<f64>,
    pub min_correlation_points: usize,
}

impl From<&AnalyticsConfig> for OptimizerSettings {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            min_allocation: config.min_allocation,
            max_allocation: config.max_allocation,
            iterations: config.optimizer_iterations,
            learning_rate: config.learning_rate,
            epsilon: config.gradient_epsilon,
            convergence_tolerance: config.convergence_tolerance,
            min_correlation_points: config.min_correlation_points,
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

/// # Summary
/// 得分比例策略下入选的标的数量：`5 + (1 - riskTolerance) * 10`，不超过候选数。
pub fn target_count(risk_tolerance: f64, candidates: usize) -> usize {
    let raw = 5.0 + (1.0 - risk_tolerance.clamp(0.0, 1.0)) * 10.0;
    (raw.floor() as usize).min(candidates)
}

/// # Summary
/// 得分比例配置（快速路径）。
///
/// # Logic
/// 1. 按得分降序排序（同分按代码升序），取前 `target_count` 个。
/// 2. 按得分占比分配权重。
/// 3. 执行上下限约束：超上限截断并按比例再分配，低于下限的剔除后重新归一。
/// 4. 若无标的存活（包括得分全为 0），退化为当前持仓等权。
///
/// # Arguments
/// * `scores`: 代码到综合得分的映射。
/// * `risk_tolerance`: 风险偏好 ∈ [0, 1]。
/// * `settings`: 上下限等参数。
/// * `current_holdings`: 当前持仓代码，用于退化方案。
///
/// # Returns
/// 成功返回配置方案；无持仓可退化时返回 `NoCandidates` 或 `ConstraintInfeasible`。
pub fn score_proportional(
    scores: &BTreeMap<String, f64>,
    risk_tolerance: f64,
    settings: &OptimizerSettings,
    current_holdings: &[String],
) -> Result<AllocationPlan, AnalysisError> {
    let mut ranked: Vec<(&String, f64)> = scores
        .iter()
        .filter(|(_, s)| s.is_finite())
        .map(|(symbol, s)| (symbol, s.max(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(target_count(risk_tolerance, ranked.len()));

    let total: f64 = ranked.iter().map(|(_, s)| s).sum();
    let raw: BTreeMap<String, f64> = if total > 0.0 {
        ranked
            .iter()
            .map(|(symbol, s)| ((*symbol).clone(), s / total))
            .collect()
    } else {
        BTreeMap::new()
    };

    let candidates = ranked.len();
    let weights = enforce_bounds(raw, settings.min_allocation, settings.max_allocation);
    if weights.is_empty() {
        return equal_weight_fallback(
            AllocationStrategy::ScoreProportional,
            current_holdings,
            candidates,
        );
    }
    Ok(AllocationPlan {
        strategy: AllocationStrategy::ScoreProportional,
        weights,
        fallback: false,
    })
}

/// # Summary
/// 均值-方差模型的输入：预期收益与协方差矩阵。
struct MeanVarianceModel {
    expected: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    risk_aversion: f64,
}

impl MeanVarianceModel {
    fn expected_return(&self, w: &[f64]) -> f64 {
        w.iter().zip(&self.expected).map(|(wi, mu)| wi * mu).sum()
    }

    fn risk(&self, w: &[f64]) -> f64 {
        let mut variance = 0.0;
        for (i, wi) in w.iter().enumerate() {
            for (j, wj) in w.iter().enumerate() {
                variance += wi * wj * self.covariance[i][j];
            }
        }
        variance.max(0.0).sqrt()
    }

    fn utility(&self, w: &[f64]) -> f64 {
        self.expected_return(w) - self.risk_aversion * self.risk(w)
    }

    // 前向差分：权重 i 加 ε 后整体归一再求效用差，扰动点仍在 Σw = 1 上
    fn gradient(&self, w: &[f64], utility: f64, epsilon: f64) -> Vec<f64> {
        (0..w.len())
            .map(|i| {
                let mut bumped = w.to_vec();
                bumped[i] += epsilon;
                for v in &mut bumped {
                    *v /= 1.0 + epsilon;
                }
                (self.utility(&bumped) - utility) / epsilon
            })
            .collect()
    }
}

/// # Summary
/// 组合预期收益 `Σ wᵢ·expectedReturnᵢ`，权重缺失的标的不计入。
pub fn expected_return(plan: &AllocationPlan, profiles: &BTreeMap<String, AnalysisProfile>) -> f64 {
    plan.weights
        .iter()
        .filter_map(|(symbol, w)| profiles.get(symbol).map(|p| w * p.predicted_return))
        .sum()
}

/// # Summary
/// 均值-方差梯度搜索（显式优化路径）。
///
/// # Logic
/// 1. 预期收益取预测收益率，协方差 `volᵢ·volⱼ·corr(i,j)`，相关系数样本不足时记 0。
/// 2. 效用 `U(w) = return(w) - (1 - riskTolerance)·risk(w)`，`risk(w) = sqrt(wᵀΣw)`。
/// 3. 从等权出发，每步对各权重加 ε 扰动（扰动后整体归一）并测量效用变化得到梯度，
///    沿 `learningRate·gradient` 移动。
/// 4. 每步之后截断负权重为 0 并重新归一到 Σw = 1；全部被截断时保留上一步权重并停止。
/// 5. 迭代固定步数；设置了收敛阈值时，效用改善低于阈值即提前停止。
/// 6. 上限可行且被突破时，把结果投影到 `{0 ≤ wᵢ ≤ max, Σw = 1}`，
///    再执行上下限约束；无标的存活则退化为当前持仓等权。
///
/// # Arguments
/// * `profiles`: 代码到画像的映射。
/// * `risk_tolerance`: 风险偏好 ∈ [0, 1]。
/// * `settings`: 迭代次数、学习率、差分步长与上下限。
/// * `current_holdings`: 当前持仓代码，用于退化方案。
///
/// # Returns
/// 成功返回配置方案；无持仓可退化时返回 `NoCandidates` 或 `ConstraintInfeasible`。
pub fn mean_variance(
    profiles: &BTreeMap<String, AnalysisProfile>,
    risk_tolerance: f64,
    settings: &OptimizerSettings,
    current_holdings: &[String],
) -> Result<AllocationPlan, AnalysisError> {
    if profiles.is_empty() {
        return equal_weight_fallback(AllocationStrategy::MeanVariance, current_holdings, 0);
    }

    let symbols: Vec<&String> = profiles.keys().collect();
    let n = symbols.len();
    let vols: Vec<f64> = profiles.values().map(|p| p.volatility).collect();
    let returns: Vec<Vec<f64>> = profiles
        .values()
        .map(|p| p.historical_returns.clone())
        .collect();
    let corr = correlation_matrix(&returns, settings.min_correlation_points);
    let covariance: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| vols[i] * vols[j] * corr[i][j]).collect())
        .collect();
    let model = MeanVarianceModel {
        expected: profiles.values().map(|p| p.predicted_return).collect(),
        covariance,
        risk_aversion: 1.0 - risk_tolerance.clamp(0.0, 1.0),
    };

    let cap = feasible_cap(n, settings.max_allocation);
    let mut weights = vec![1.0 / n as f64; n];
    let mut utility = model.utility(&weights);

    for step in 0..settings.iterations {
        let gradient = model.gradient(&weights, utility, settings.epsilon);
        let moved: Vec<f64> = weights
            .iter()
            .zip(&gradient)
            .map(|(w, g)| w + settings.learning_rate * g)
            .collect();
        let Some(next_weights) = clip_and_normalize(&moved) else {
            debug!("Mean-variance step {} clipped every weight; keeping the last iterate", step);
            break;
        };
        weights = next_weights;

        let next = model.utility(&weights);
        let improvement = next - utility;
        utility = next;
        if let Some(tolerance) = settings.convergence_tolerance
            && improvement.abs() < tolerance
        {
            debug!("Mean-variance search converged after {} steps", step + 1);
            break;
        }
    }
    debug!(
        "Mean-variance search finished: utility {:.6}, return {:.6}, risk {:.6}",
        utility,
        model.expected_return(&weights),
        model.risk(&weights)
    );

    if weights.iter().any(|w| *w > cap + EPS) {
        weights = project_to_simplex(&weights, cap);
    }

    let raw: BTreeMap<String, f64> = symbols
        .into_iter()
        .cloned()
        .zip(weights)
        .collect();
    let bounded = enforce_bounds(raw, settings.min_allocation, settings.max_allocation);
    if bounded.is_empty() {
        return equal_weight_fallback(AllocationStrategy::MeanVariance, current_holdings, n);
    }
    Ok(AllocationPlan {
        strategy: AllocationStrategy::MeanVariance,
        weights: bounded,
        fallback: false,
    })
}

/// 截断负权重并归一；全部非正或非有限时返回 None。
fn clip_and_normalize(values: &[f64]) -> Option<Vec<f64>> {
    let clipped: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    let sum: f64 = clipped.iter().sum();
    if sum <= EPS || !sum.is_finite() {
        return None;
    }
    Some(clipped.into_iter().map(|v| v / sum).collect())
}

/// 上限仅在 `n · max ≥ 1` 时可行，否则不设上限。
fn feasible_cap(n: usize, max_allocation: f64) -> f64 {
    if n as f64 * max_allocation >= 1.0 - EPS {
        max_allocation
    } else {
        1.0
    }
}

/// # Summary
/// 把任意向量投影到 `{0 ≤ wᵢ ≤ cap, Σw = 1}`。
///
/// # Logic
/// 二分查找平移量 τ，使 `Σ clamp(vᵢ - τ, 0, cap) = 1`，再做一次归一消除残差。
fn project_to_simplex(values: &[f64], cap: f64) -> Vec<f64> {
    let filled = |tau: f64| -> f64 { values.iter().map(|v| (v - tau).clamp(0.0, cap)).sum() };
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min) - cap;
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for _ in 0..PROJECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if filled(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let tau = 0.5 * (lo + hi);
    let mut projected: Vec<f64> = values.iter().map(|v| (v - tau).clamp(0.0, cap)).collect();
    let sum: f64 = projected.iter().sum();
    if sum > EPS {
        for w in &mut projected {
            *w /= sum;
        }
    }
    projected
}

/// # Summary
/// 执行上下限约束。
///
/// # Logic
/// 反复执行以下步骤直到稳定：
/// 1. 剔除非正与非有限权重并归一。
/// 2. 上限可行时，把超上限部分截断，按比例分给未触顶的标的。
/// 3. 剔除低于下限的标的；若有剔除则回到第 1 步。
///
/// # Returns
/// 满足约束的权重映射；全部被剔除时返回空映射。
pub fn enforce_bounds(
    weights: BTreeMap<String, f64>,
    min_allocation: f64,
    max_allocation: f64,
) -> BTreeMap<String, f64> {
    let mut w: BTreeMap<String, f64> = weights
        .into_iter()
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();

    for _ in 0..=w.len() {
        let sum: f64 = w.values().sum();
        if sum <= EPS {
            return BTreeMap::new();
        }
        for v in w.values_mut() {
            *v /= sum;
        }

        let cap = feasible_cap(w.len(), max_allocation);
        cap_weights(&mut w, cap);

        let before = w.len();
        w.retain(|_, v| *v >= min_allocation - EPS);
        if w.len() == before {
            break;
        }
    }
    w
}

// 截断超上限权重，超出部分按比例分给未触顶的标的
fn cap_weights(w: &mut BTreeMap<String, f64>, cap: f64) {
    for _ in 0..w.len() {
        let excess: f64 = w.values().filter(|v| **v > cap).map(|v| v - cap).sum();
        if excess <= EPS {
            return;
        }
        for v in w.values_mut() {
            if *v > cap {
                *v = cap;
            }
        }
        let free: f64 = w.values().filter(|v| **v < cap - EPS).sum();
        let open = w.values().filter(|v| **v < cap - EPS).count();
        if open == 0 {
            return;
        }
        for v in w.values_mut().filter(|v| **v < cap - EPS) {
            *v += if free > EPS {
                excess * (*v / free)
            } else {
                excess / open as f64
            };
        }
    }
}

/// # Summary
/// 约束不可行时的退化方案：当前持仓等权。
///
/// # Arguments
/// * `candidates`: 参与配置但未能满足约束的候选数。
///
/// # Returns
/// 持仓为空时：没有候选返回 `NoCandidates`，有候选返回 `ConstraintInfeasible`；
/// 否则返回 `fallback = true` 的方案。
pub fn equal_weight_fallback(
    strategy: AllocationStrategy,
    current_holdings: &[String],
    candidates: usize,
) -> Result<AllocationPlan, AnalysisError> {
    if current_holdings.is_empty() {
        if candidates == 0 {
            return Err(AnalysisError::NoCandidates);
        }
        return Err(AnalysisError::ConstraintInfeasible(format!(
            "none of {} candidates fits the allocation bounds and there are no holdings",
            candidates
        )));
    }
    warn!(
        "No candidate survived the allocation bounds; equal-weighting {} current holdings",
        current_holdings.len()
    );
    let weight = 1.0 / current_holdings.len() as f64;
    Ok(AllocationPlan {
        strategy,
        weights: current_holdings
            .iter()
            .map(|s| (s.clone(), weight))
            .collect(),
        fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_sums_to_one() {
        let w = project_to_simplex(&[0.9, -0.3, 0.5, 0.1], 1.0);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(w.iter().all(|v| *v >= 0.0));
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_clip_and_normalize() {
        let w = clip_and_normalize(&[0.9, -0.3, 0.5, 0.1]).unwrap();
        assert!((w[0] - 0.6).abs() < 1e-12);
        assert_eq!(w[1], 0.0);
        assert!((w[3] - 0.1 / 1.5).abs() < 1e-12);
        assert!(clip_and_normalize(&[-1.0, 0.0]).is_none());
    }

    #[test]
    fn test_projection_respects_cap() {
        let w = project_to_simplex(&[5.0, 4.0, 0.0, 0.0, 0.0], 0.4);
        assert!(w.iter().all(|v| *v <= 0.4 + 1e-9));
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cap_redistributes_proportionally() {
        let mut w: BTreeMap<String, f64> = [("A", 0.7), ("B", 0.2), ("C", 0.1)]
            .into_iter()
            .map(|(s, v)| (s.to_string(), v))
            .collect();
        cap_weights(&mut w, 0.5);
        assert!((w["A"] - 0.5).abs() < 1e-12);
        assert!((w["B"] - (0.2 + 0.2 * 2.0 / 3.0)).abs() < 1e-12);
        assert!((w.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_target_count() {
        assert_eq!(target_count(0.0, 100), 15);
        assert_eq!(target_count(1.0, 100), 5);
        assert_eq!(target_count(0.5, 100), 10);
        assert_eq!(target_count(0.0, 3), 3);
    }
}
