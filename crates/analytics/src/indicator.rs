use folio_core::indicator::entity::IndicatorFrame;
use folio_core::market::entity::{PriceBar, closes};

pub const SMA_SHORT: usize = 20;
pub const SMA_MEDIUM: usize = 50;
pub const SMA_LONG: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;

/// RSI 未定义时的中性值
pub const NEUTRAL_RSI: f64 = 50.0;
/// 布林带未定义时上下轨相对价格的偏移
pub const FALLBACK_BAND_RATIO: f64 = 0.02;
/// 低于该样本数时长周期指标仍处于预热阶段
pub const STABLE_HISTORY: usize = 100;

/// # Summary
/// 简单移动平均。
///
/// # Logic
/// 下标 `i >= period - 1` 处取最近 `period` 个价格的均值，此前未定义。
///
/// # Arguments
/// * `prices`: 按时间升序的价格。
/// * `period`: 窗口长度，为 0 时全部未定义。
///
/// # Returns
/// 与输入等长的序列，未定义处为 `None`。
pub fn sma(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }
    for (i, window) in prices.windows(period).enumerate() {
        out[i + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

/// # Summary
/// 指数移动平均。
///
/// # Logic
/// 1. 以前 `period` 个价格的 SMA 作为种子，落在下标 `period - 1`。
/// 2. 此后递推 `EMA_t = (price_t - EMA_{t-1}) * 2 / (period + 1) + EMA_{t-1}`。
pub fn ema(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = prices[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);
    for (slot, &price) in out.iter_mut().zip(prices).skip(period) {
        prev = (price - prev) * k + prev;
        *slot = Some(prev);
    }
    out
}

/// 对一段"前缀未定义、之后连续有定义"的序列求 EMA，用于 MACD 信号线。
fn ema_of_defined(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Some(start) = series.iter().position(Option::is_some) else {
        return vec![None; series.len()];
    };
    let values: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut out = vec![None; start];
    out.extend(ema(&values, period));
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// # Summary
/// 相对强弱指数 (Wilder 平滑)。
///
/// # Logic
/// 1. 前 `period` 个价格变动的平均涨幅/跌幅作为种子，首个值落在下标 `period`。
/// 2. 此后 `avg = (avg * (period - 1) + 当期值) / period`。
/// 3. 平均跌幅为 0 时 RSI = 100。
pub fn rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period {
        return out;
    }
    let p = period as f64;
    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / p;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for (i, &change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (p - 1.0) + gain(change)) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss(change)) / p;
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

/// # Summary
/// MACD 三条线，均与输入等长。
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// # Summary
/// MACD 趋势指标。
///
/// # Logic
/// 1. 主线 = EMA(fast) - EMA(slow)，两者都有定义时才有定义。
/// 2. 信号线 = 主线的 EMA(signal)。
/// 3. 柱状图 = 主线 - 信号线。
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema(prices, fast);
    let slow_ema = ema(prices, slow);
    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_defined(&line, signal);
    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();
    MacdSeries {
        line,
        signal: signal_line,
        histogram,
    }
}

/// 单点布林带。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// # Summary
/// 布林带：中轨为 SMA(period)，上下轨为中轨 ± k 倍窗口内总体标准差。
///
/// # Invariants
/// - 对任意 `k >= 0`，有定义处 `lower <= middle <= upper`。
pub fn bollinger(prices: &[f64], period: usize, k: f64) -> Vec<Option<BollingerBand>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }
    for (i, window) in prices.windows(period).enumerate() {
        let middle = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
        let width = k * variance.sqrt();
        out[i + period - 1] = Some(BollingerBand {
            upper: middle + width,
            middle,
            lower: middle - width,
        });
    }
    out
}

/// # Summary
/// 为一段有序日线计算完整的指标帧序列。
///
/// # Logic
/// 1. 分别计算三条均线、RSI、MACD 与布林带。
/// 2. 逐日组装 `IndicatorFrame`，未定义处按约定回退：
///    均线取当日价格，RSI 取 50，MACD 三线取 0，布林带取价格 ×1.02 / ×0.98（中轨取价格）。
///
/// # Arguments
/// * `symbol`: 证券代码。
/// * `bars`: 按日期升序的日线。
///
/// # Returns
/// 与 `bars` 等长的指标帧，空输入返回空序列。
pub fn compute_frames(symbol: &str, bars: &[PriceBar]) -> Vec<IndicatorFrame> {
    let prices = closes(bars);
    let sma20 = sma(&prices, SMA_SHORT);
    let sma50 = sma(&prices, SMA_MEDIUM);
    let sma200 = sma(&prices, SMA_LONG);
    let rsi14 = rsi(&prices, RSI_PERIOD);
    let macd = macd(&prices, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let bands = bollinger(&prices, BOLLINGER_PERIOD, BOLLINGER_K);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let price = bar.close;
            let band = bands[i].unwrap_or(BollingerBand {
                upper: price * (1.0 + FALLBACK_BAND_RATIO),
                middle: price,
                lower: price * (1.0 - FALLBACK_BAND_RATIO),
            });
            IndicatorFrame {
                symbol: symbol.to_string(),
                date: bar.date,
                price,
                sma20: sma20[i].unwrap_or(price),
                sma50: sma50[i].unwrap_or(price),
                sma200: sma200[i].unwrap_or(price),
                rsi14: rsi14[i].unwrap_or(NEUTRAL_RSI),
                macd_line: macd.line[i].unwrap_or(0.0),
                macd_signal: macd.signal[i].unwrap_or(0.0),
                macd_histogram: macd.histogram[i].unwrap_or(0.0),
                bollinger_upper: band.upper,
                bollinger_middle: band.middle,
                bollinger_lower: band.lower,
            }
        })
        .collect()
}

// 多空方向打分：高于 1，低于 0，持平 0.5
fn direction(a: f64, b: f64) -> f64 {
    if a > b {
        1.0
    } else if a < b {
        0.0
    } else {
        0.5
    }
}

/// # Summary
/// 由最新一帧指标推导技术面得分。
///
/// # Logic
/// 取五个子信号的均值：
/// 1. RSI：≤30 超卖记 1，≥70 超买记 0，之间线性插值。
/// 2. MACD 柱状图方向。
/// 3. 价格相对 SMA50 的方向。
/// 4. SMA20 相对 SMA50 的方向（金叉/死叉）。
/// 5. 价格在布林带中的位置：越靠近下轨越高，带宽为 0 时记 0.5。
///
/// # Returns
/// ∈ [0, 1] 的得分，冷启动（全部回退值）时恰为 0.5。
pub fn technical_score(frame: &IndicatorFrame) -> f64 {
    let rsi_signal = ((70.0 - frame.rsi14) / 40.0).clamp(0.0, 1.0);
    let macd_signal = direction(frame.macd_histogram, 0.0);
    let trend_signal = direction(frame.price, frame.sma50);
    let cross_signal = direction(frame.sma20, frame.sma50);
    let band_width = frame.bollinger_upper - frame.bollinger_lower;
    let band_signal = if band_width > 0.0 {
        ((frame.bollinger_upper - frame.price) / band_width).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let score = (rsi_signal + macd_signal + trend_signal + cross_signal + band_signal) / 5.0;
    if score.is_finite() { score } else { 0.5 }
}
