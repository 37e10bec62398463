use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// # Summary
/// 单根日线行情实体，记录某一交易日的价格与成交量。
///
/// # Invariants
/// - 记录后不可变。
/// - 同一 symbol 下按 `date` 升序排列且日期唯一。
/// - `high` 必须大于或等于 `low`, `open`, `close`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    // 证券代码
    pub symbol: String,
    // 交易日
    pub date: NaiveDate,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量
    pub volume: f64,
    // 复权收盘价 (处理分红、拆股)
    pub adj_close: f64,
}

impl PriceBar {
    /// # Summary
    /// 以单一收盘价构造一根日线，开高低与复权价均取收盘价。
    ///
    /// # Arguments
    /// * `symbol`: 证券代码。
    /// * `date`: 交易日。
    /// * `close`: 收盘价。
    ///
    /// # Returns
    /// 成交量为 0 的平盘 K 线。
    pub fn from_close(symbol: &str, date: NaiveDate, close: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            adj_close: close,
        }
    }
}

/// # Summary
/// 从有序行情中抽取收盘价序列。
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
