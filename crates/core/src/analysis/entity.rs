use crate::portfolio::entity::StockAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// # Summary
/// 单次优化运行内的标的风险收益画像。
///
/// # Invariants
/// - 生命周期仅限一次优化调用，从不持久化。
/// - `technical_score` ∈ [0, 1]，`confidence_score` ∈ [0, 1]。
/// - `volatility` 为日收益率的总体标准差。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProfile {
    pub symbol: String,
    pub current_price: f64,
    // 预测收益率 (小数)
    pub predicted_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub confidence_score: f64,
    pub momentum_score: f64,
    pub technical_score: f64,
    // 按时间排序的日收益率
    pub historical_returns: Vec<f64>,
}

/// # Summary
/// 配置优化策略，由调用意图选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationStrategy {
    // 按得分比例分配 (快速路径，用于 AI 推荐)
    ScoreProportional,
    // 均值-方差梯度搜索 (用于显式优化)
    MeanVariance,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStrategy::ScoreProportional => write!(f, "score-proportional"),
            AllocationStrategy::MeanVariance => write!(f, "mean-variance"),
        }
    }
}

/// # Summary
/// 目标配置方案：证券代码到权重的映射。
///
/// # Invariants
/// - 每个权重 ∈ [0, 1]，归一化后权重之和 = 1 ± 1e-2。
/// - 可行时每个入选权重落在 [最小配置, 最大配置] 之间。
/// - `fallback` 为 true 表示约束不可行，已退化为当前持仓等权。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub strategy: AllocationStrategy,
    pub weights: BTreeMap<String, f64>,
    pub fallback: bool,
}

impl AllocationPlan {
    /// 指定标的的目标权重，未入选返回 0。
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }
}

/// # Summary
/// 批量画像计算结果，单标的失败被吸收进 `failed_symbols`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileBatch {
    pub profiles: BTreeMap<String, AnalysisProfile>,
    // 综合得分 (已考虑风险偏好与持仓偏置)
    pub scores: BTreeMap<String, f64>,
    pub failed_symbols: Vec<String>,
}

/// # Summary
/// 一次推荐计算的完整结果，按 (组合, 风险偏好, 是否扩展标的池) 记忆化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub portfolio_id: String,
    pub risk_tolerance: f64,
    pub expand_universe: bool,
    pub plan: AllocationPlan,
    pub actions: Vec<StockAction>,
    pub scores: BTreeMap<String, f64>,
    pub failed_symbols: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
