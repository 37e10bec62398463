use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// # Summary
/// 单个交易日的技术指标快照。
///
/// # Invariants
/// - 与某一根 `PriceBar` 一一对应。
/// - 所有字段均为有限数值：窗口期不足时按约定回退（均线取价格、RSI 取 50、
///   MACD 取 0、布林带取价格 ±2%），不会出现 NaN。
/// - 属于派生数据，重算时整段删除后重新写入，不做增量修补。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub symbol: String,
    pub date: NaiveDate,
    // 当日收盘价
    pub price: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub sma200: f64,
    pub rsi14: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
}
