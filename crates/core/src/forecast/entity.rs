use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 预测涨跌幅的合法上界（百分比）。
pub const MAX_CHANGE_PERCENT: f64 = 20.0;

/// # Summary
/// 外部预测器给出的单标的收益预测。
///
/// # Invariants
/// - `predicted_change_percent` ∈ [-20, 20]。
/// - `confidence_score` ∈ [0, 100]。
/// - 每次优化只采用一个"当前"预测。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub symbol: String,
    // 预测基准日
    pub as_of_date: NaiveDate,
    pub current_price: f64,
    pub predicted_price: f64,
    // 预测涨跌幅 (百分比)
    pub predicted_change_percent: f64,
    // 置信度 (0-100)
    pub confidence_score: f64,
    // 预测目标日
    pub target_date: NaiveDate,
}

impl Forecast {
    /// 预测收益率（小数形式），越界值会被夹紧到合法区间。
    pub fn predicted_return(&self) -> f64 {
        self.predicted_change_percent
            .clamp(-MAX_CHANGE_PERCENT, MAX_CHANGE_PERCENT)
            / 100.0
    }

    /// 置信度（小数形式，[0, 1]）。
    pub fn confidence(&self) -> f64 {
        self.confidence_score.clamp(0.0, 100.0) / 100.0
    }
}
