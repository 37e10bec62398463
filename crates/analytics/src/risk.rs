//! 风险度量：日收益率、波动率、相关系数与夏普比率。

/// 波动率低于该值视为 0
const VOLATILITY_FLOOR: f64 = 1e-12;

/// # Summary
/// 由收盘价计算日收益率 `r_t = (close_t - close_{t-1}) / close_{t-1}`。
///
/// # Returns
/// 长度为 `closes.len() - 1` 的序列；前一日价格非正时该日收益记 0，保持对齐。
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// 算术均值，空序列为 0。
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 总体标准差，空序列为 0。
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 波动率：日收益率的总体标准差。
pub fn volatility(returns: &[f64]) -> f64 {
    population_std(returns)
}

/// # Summary
/// 皮尔逊相关系数。
///
/// # Returns
/// 两序列等长部分的相关系数，∈ [-1, 1]；任一方差为 0 或为空时返回 0。
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// # Summary
/// 两条收益率序列的相关系数。
///
/// # Logic
/// 1. 以较短序列长度为重叠长度，各取最近的重叠段对齐。
/// 2. 重叠样本数少于 `min_points` 时视为低置信度，返回 0。
/// 3. 否则使用皮尔逊公式。
pub fn correlation(a: &[f64], b: &[f64], min_points: usize) -> f64 {
    let overlap = a.len().min(b.len());
    if overlap < min_points || overlap == 0 {
        return 0.0;
    }
    pearson(&a[a.len() - overlap..], &b[b.len() - overlap..])
}

/// # Summary
/// 构建相关系数矩阵，对角线恒为 1。
pub fn correlation_matrix(series: &[Vec<f64>], min_points: usize) -> Vec<Vec<f64>> {
    let n = series.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let c = correlation(&series[i], &series[j], min_points);
            matrix[i][j] = c;
            matrix[j][i] = c;
        }
    }
    matrix
}

/// # Summary
/// 夏普比率 `(mean(r) - 日无风险利率) / 波动率`，波动率为 0 时返回 0。
pub fn sharpe_ratio(returns: &[f64], daily_risk_free_rate: f64) -> f64 {
    let vol = volatility(returns);
    if vol < VOLATILITY_FLOOR {
        return 0.0;
    }
    (mean(returns) - daily_risk_free_rate) / vol
}

/// # Summary
/// 动量：最近 `window` 个交易日的累计收益。
///
/// # Logic
/// `close_last / close_{last-window} - 1`，历史不足时以首个收盘价为基准。
pub fn momentum(closes: &[f64], window: usize) -> f64 {
    let n = closes.len();
    if n < 2 {
        return 0.0;
    }
    let last = closes[n - 1];
    let base = closes[n.saturating_sub(window + 1)];
    if base <= 0.0 {
        return 0.0;
    }
    last / base - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_returns_alignment() {
        let r = daily_returns(&[100.0, 110.0, 0.0, 5.0]);
        assert_eq!(r.len(), 3);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn test_momentum_short_history() {
        assert_eq!(momentum(&[], 20), 0.0);
        assert_eq!(momentum(&[10.0], 20), 0.0);
        assert!((momentum(&[10.0, 11.0, 12.0], 20) - 0.2).abs() < 1e-12);
        assert!((momentum(&[10.0, 11.0, 12.0], 1) - (12.0 / 11.0 - 1.0)).abs() < 1e-12);
    }
}
