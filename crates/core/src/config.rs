use serde::{Deserialize, Serialize};

/// 年化无风险利率折算为日利率时使用的交易日数
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub analytics: AnalyticsConfig,
    pub forecast: ForecastConfig,
    pub universe: UniverseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    // EnvFilter 语法，RUST_LOG 优先
    pub level: String,
    // 滚动日志目录
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
        }
    }
}

/// # Summary
/// 分析与优化引擎参数。
///
/// # Invariants
/// - `0 <= min_allocation <= max_allocation <= 1`。
/// - `optimizer_iterations` 为固定迭代预算；`convergence_tolerance` 为 None 时不提前停止。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    // 年化无风险利率
    pub risk_free_rate: f64,
    // 计算画像时回看的日历天数
    pub lookback_days: i64,
    // 计算指标时额外向前预热的日历天数
    pub indicator_warmup_days: i64,
    pub min_allocation: f64,
    pub max_allocation: f64,
    pub optimizer_iterations: usize,
    pub learning_rate: f64,
    pub gradient_epsilon: f64,
    pub convergence_tolerance: Option<f64>,
    pub momentum_window: usize,
    // 相关系数所需的最少重叠样本数
    pub min_correlation_points: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            lookback_days: 365,
            indicator_warmup_days: 300,
            min_allocation: 0.02,
            max_allocation: 0.40,
            optimizer_iterations: 500,
            learning_rate: 0.5,
            gradient_epsilon: 1e-4,
            convergence_tolerance: None,
            momentum_window: 20,
            min_correlation_points: 30,
        }
    }
}

impl AnalyticsConfig {
    /// 日无风险利率。
    pub fn daily_risk_free_rate(&self) -> f64 {
        self.risk_free_rate / TRADING_DAYS_PER_YEAR
    }
}

/// # Summary
/// 参考预测器 (线性趋势外推) 参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    // 参与回归的最近收盘价个数
    pub window: usize,
    // 预测的交易日跨度
    pub horizon_days: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: 60,
            horizon_days: 20,
        }
    }
}

/// 标的池配置，开启扩展时这些标的会作为候选参与配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.analytics.max_allocation, 0.40);
        assert_eq!(config.analytics.optimizer_iterations, 500);
        assert!(config.analytics.convergence_tolerance.is_none());
        assert_eq!(config.forecast.window, 60);
        assert!(config.universe.symbols.is_empty());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"analytics": {"max_allocation": 0.25}}"#).unwrap();
        assert_eq!(config.analytics.max_allocation, 0.25);
        assert_eq!(config.analytics.min_allocation, 0.02);
        assert_eq!(config.database.data_dir, "data");
    }

    #[test]
    fn test_daily_risk_free_rate() {
        let config = AnalyticsConfig {
            risk_free_rate: 0.0504,
            ..AnalyticsConfig::default()
        };
        assert!((config.daily_risk_free_rate() - 0.0002).abs() < 1e-12);
    }
}
