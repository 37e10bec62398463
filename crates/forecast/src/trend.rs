use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use folio_core::common::normalize_symbol;
use folio_core::common::time::TimeProvider;
use folio_core::config::ForecastConfig;
use folio_core::forecast::entity::{Forecast, MAX_CHANGE_PERCENT};
use folio_core::forecast::error::ForecastError;
use folio_core::forecast::port::ForecastProvider;
use folio_core::market::entity::closes;
use folio_core::market::port::PriceHistoryProvider;
use linreg::linear_regression;
use std::sync::Arc;
use tracing::debug;

/// 回归所需的最少收盘价个数
pub const MIN_TREND_POINTS: usize = 10;
// 交易日折算日历日时的放大系数，覆盖周末与节假日
const CALENDAR_SLACK: u64 = 2;

/// # Summary
/// 线性趋势预测器。
///
/// # Invariants
/// - 预测涨跌幅被夹紧到 [-20, 20] %。
/// - 置信度 = 100 · R²，价格序列完全水平时为 0。
pub struct TrendForecaster {
    prices: Arc<dyn PriceHistoryProvider>,
    clock: Arc<dyn TimeProvider>,
    config: ForecastConfig,
}

/// 单次回归的结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl TrendFit {
    /// 在横坐标 `x` 处的回归值。
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// # Summary
/// 以下标为横坐标对价格序列做最小二乘拟合。
///
/// # Returns
/// 点数不足 2 或回归退化时返回 None。
pub fn fit_trend(prices: &[f64]) -> Option<TrendFit> {
    if prices.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = (0..prices.len()).map(|i| i as f64).collect();
    let (slope, intercept): (f64, f64) = linear_regression(&xs, prices).ok()?;

    let mean = prices.iter().sum::<f64>() / xs.len() as f64;
    let total: f64 = prices.iter().map(|y| (y - mean).powi(2)).sum();
    let residual: f64 = xs
        .iter()
        .zip(prices)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = if total > 0.0 {
        (1.0 - residual / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Some(TrendFit {
        slope,
        intercept,
        r_squared,
    })
}

impl TrendForecaster {
    pub fn new(
        prices: Arc<dyn PriceHistoryProvider>,
        clock: Arc<dyn TimeProvider>,
        config: ForecastConfig,
    ) -> Self {
        Self {
            prices,
            clock,
            config,
        }
    }

    fn history_start(&self, today: NaiveDate) -> NaiveDate {
        let span = u64::try_from(self.config.window).unwrap_or(u64::MAX);
        today
            .checked_sub_days(Days::new(span.saturating_mul(CALENDAR_SLACK)))
            .unwrap_or(NaiveDate::MIN)
    }
}

#[async_trait]
impl ForecastProvider for TrendForecaster {
    /// # Summary
    /// 对单个标的给出预测。
    ///
    /// # Logic
    /// 1. 读取最近约 `2 · window` 个日历日的日线，取最后 `window` 个收盘价。
    /// 2. 少于 10 个点时返回 `InsufficientHistory`。
    /// 3. 线性回归后外推 `horizon_days` 个交易日，得到预测价格。
    /// 4. 涨跌幅夹紧到 ±20 %，按夹紧后的涨跌幅回算预测价格。
    async fn forecast(&self, symbol: &str) -> Result<Forecast, ForecastError> {
        let symbol = normalize_symbol(symbol);
        let today = self.clock.today();
        let bars = self
            .prices
            .get_price_history(&symbol, self.history_start(today), today)
            .await?;

        let all = closes(&bars);
        let recent = &all[all.len().saturating_sub(self.config.window)..];
        if recent.len() < MIN_TREND_POINTS {
            return Err(ForecastError::InsufficientHistory {
                symbol,
                required: MIN_TREND_POINTS,
                got: recent.len(),
            });
        }
        let (Some(current_price), Some(last_bar)) = (recent.last().copied(), bars.last()) else {
            return Err(ForecastError::Unavailable {
                symbol,
                reason: "empty price history".to_string(),
            });
        };
        if current_price <= 0.0 {
            return Err(ForecastError::Unavailable {
                symbol,
                reason: format!("non-positive last close {}", current_price),
            });
        }
        let fit = fit_trend(recent).ok_or_else(|| ForecastError::Unavailable {
            symbol: symbol.clone(),
            reason: "degenerate regression".to_string(),
        })?;

        let horizon = f64::from(self.config.horizon_days);
        let last_x = (recent.len() - 1) as f64;
        let projected = fit.at(last_x + horizon);
        let change = ((projected - current_price) / current_price * 100.0)
            .clamp(-MAX_CHANGE_PERCENT, MAX_CHANGE_PERCENT);
        debug!(
            "Trend forecast for {}: slope {:.4}, r2 {:.3}, change {:.2}%",
            symbol, fit.slope, fit.r_squared, change
        );

        Ok(Forecast {
            as_of_date: last_bar.date,
            current_price,
            predicted_price: current_price * (1.0 + change / 100.0),
            predicted_change_percent: change,
            confidence_score: fit.r_squared * 100.0,
            target_date: last_bar
                .date
                .checked_add_days(Days::new(u64::from(self.config.horizon_days)))
                .unwrap_or(last_bar.date),
            symbol,
        })
    }
}
