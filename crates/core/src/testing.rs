//! 测试替身：供其他 crate 的集成测试注入的内存端口实现。

use crate::forecast::entity::Forecast;
use crate::forecast::error::ForecastError;
use crate::forecast::port::ForecastProvider;
use crate::market::entity::PriceBar;
use crate::market::error::MarketError;
use crate::market::port::PriceHistoryProvider;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use dashmap::DashMap;

/// # Summary
/// 以收盘价序列生成逐日连续的日线。
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .filter_map(|(i, &c)| {
            start
                .checked_add_days(Days::new(u64::try_from(i).ok()?))
                .map(|d| PriceBar::from_close(symbol, d, c))
        })
        .collect()
}

/// # Summary
/// 内存行情源，按代码保存完整的日线序列，查询时按区间过滤。
///
/// # Invariants
/// - 可通过 `fail_on` 模拟某个标的的数据源故障。
#[derive(Default)]
pub struct StaticPriceHistory {
    bars: DashMap<String, Vec<PriceBar>>,
    failing: DashMap<String, ()>,
}

impl StaticPriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入（覆盖）某个标的的全部日线。
    pub fn insert(&self, symbol: &str, mut bars: Vec<PriceBar>) {
        bars.sort_by_key(|b| b.date);
        self.bars.insert(symbol.to_string(), bars);
    }

    /// 令该标的的后续查询全部失败。
    pub fn fail_on(&self, symbol: &str) {
        self.failing.insert(symbol.to_string(), ());
    }
}

#[async_trait]
impl PriceHistoryProvider for StaticPriceHistory {
    async fn get_price_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, MarketError> {
        if self.failing.contains_key(symbol) {
            return Err(MarketError::Unavailable(format!("{} is offline", symbol)));
        }
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= from && b.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// # Summary
/// 内存预测器，未登记的标的视为无法预测。
#[derive(Default)]
pub struct StaticForecasts {
    forecasts: DashMap<String, Forecast>,
}

impl StaticForecasts {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Summary
    /// 登记一个预测，目标日为基准日后 30 天。
    pub fn insert(&self, symbol: &str, as_of: NaiveDate, price: f64, change_percent: f64, confidence: f64) {
        let target_date = as_of.checked_add_days(Days::new(30)).unwrap_or(as_of);
        self.forecasts.insert(
            symbol.to_string(),
            Forecast {
                symbol: symbol.to_string(),
                as_of_date: as_of,
                current_price: price,
                predicted_price: price * (1.0 + change_percent / 100.0),
                predicted_change_percent: change_percent,
                confidence_score: confidence,
                target_date,
            },
        );
    }
}

#[async_trait]
impl ForecastProvider for StaticForecasts {
    async fn forecast(&self, symbol: &str) -> Result<Forecast, ForecastError> {
        self.forecasts
            .get(symbol)
            .map(|f| f.value().clone())
            .ok_or_else(|| ForecastError::Unavailable {
                symbol: symbol.to_string(),
                reason: "no forecast registered".to_string(),
            })
    }
}
