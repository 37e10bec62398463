use crate::error::ManagerError;
use chrono::{Days, NaiveDate};
use folio_analytics::optimizer::{self, OptimizerSettings};
use folio_analytics::{action, indicator, metrics, profile, scorer};
use folio_core::analysis::entity::{AllocationPlan, AllocationStrategy, AnalysisProfile, ProfileBatch};
use folio_core::analysis::error::AnalysisError;
use folio_core::common::normalize_symbol;
use folio_core::common::time::TimeProvider;
use folio_core::config::AnalyticsConfig;
use folio_core::forecast::port::ForecastProvider;
use folio_core::indicator::entity::IndicatorFrame;
use folio_core::indicator::port::IndicatorStore;
use folio_core::market::port::PriceHistoryProvider;
use folio_core::portfolio::entity::{Portfolio, StockAction};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// # Summary
/// 分析服务，对外暴露指标计算、画像、配置优化与调仓计划等操作。
///
/// # Invariants
/// - 所有外部协作方通过端口注入，服务本身无状态，可在多个任务间共享。
/// - 批量画像逐个标的顺序执行，单标的失败只会使其被剔除。
pub struct AnalysisService {
    prices: Arc<dyn PriceHistoryProvider>,
    forecasts: Arc<dyn ForecastProvider>,
    indicators: Arc<dyn IndicatorStore>,
    clock: Arc<dyn TimeProvider>,
    config: AnalyticsConfig,
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    u64::try_from(days)
        .ok()
        .and_then(|d| date.checked_sub_days(Days::new(d)))
        .unwrap_or(date)
}

impl AnalysisService {
    pub fn new(
        prices: Arc<dyn PriceHistoryProvider>,
        forecasts: Arc<dyn ForecastProvider>,
        indicators: Arc<dyn IndicatorStore>,
        clock: Arc<dyn TimeProvider>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            prices,
            forecasts,
            indicators,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// # Summary
    /// 计算并持久化某证券在 `[from, to]` 内的技术指标。
    ///
    /// # Logic
    /// 1. 向前多取 `indicator_warmup_days` 个日历日的行情用于预热长窗口指标。
    /// 2. 在整段行情上计算指标帧，只保留区间内的帧。
    /// 3. 以"先删后插"整体替换区间内的旧指标，重复调用结果一致。
    ///
    /// # Arguments
    /// * `symbol`: 证券代码。
    /// * `from`: 区间起点（包含）。
    /// * `to`: 区间终点（包含）。
    ///
    /// # Returns
    /// 按日期升序的指标帧；区间内无行情时返回空序列。
    pub async fn compute_indicators(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndicatorFrame>, ManagerError> {
        let symbol = normalize_symbol(symbol);
        if from > to {
            return Ok(Vec::new());
        }
        let warmup_from = days_before(from, self.config.indicator_warmup_days);
        let bars = self
            .prices
            .get_price_history(&symbol, warmup_from, to)
            .await
            .map_err(|e| AnalysisError::from_market(&symbol, &e))?;

        let frames: Vec<IndicatorFrame> = indicator::compute_frames(&symbol, &bars)
            .into_iter()
            .filter(|f| f.date >= from && f.date <= to)
            .collect();
        self.indicators
            .replace_range(&symbol, from, to, &frames)
            .await?;
        debug!(
            "Computed {} indicator frames for {} from {} bars",
            frames.len(),
            symbol,
            bars.len()
        );
        Ok(frames)
    }

    /// # Summary
    /// 构建单个标的的画像。
    ///
    /// # Logic
    /// 1. 读取最近 `lookback_days` 个日历日的行情。
    /// 2. 获取该标的的当前预测。
    /// 3. 交给纯计算层构建画像。
    pub async fn analysis_profile(&self, symbol: &str) -> Result<AnalysisProfile, AnalysisError> {
        let today = self.clock.today();
        let from = days_before(today, self.config.lookback_days);
        let bars = self
            .prices
            .get_price_history(symbol, from, today)
            .await
            .map_err(|e| AnalysisError::from_market(symbol, &e))?;
        let forecast = self
            .forecasts
            .forecast(symbol)
            .await
            .map_err(|e| AnalysisError::from_forecast(symbol, &e))?;
        profile::build_profile(symbol, &bars, &forecast, &self.config)
    }

    /// # Summary
    /// 批量计算画像并打分。
    ///
    /// # Logic
    /// 1. 规范化并去重代码。
    /// 2. 逐个标的顺序构建画像；单标的错误记入 `failed_symbols` 并告警，批量继续，
    ///    其余错误终止整个批次。
    /// 3. 对成功的画像按风险偏好打分，当前持仓施加持仓偏置。
    ///
    /// # Arguments
    /// * `symbols`: 候选代码。
    /// * `risk_tolerance`: 风险偏好 ∈ [0, 1]。
    /// * `holdings`: 当前持仓代码。
    pub async fn compute_analysis_profiles(
        &self,
        symbols: &[String],
        risk_tolerance: f64,
        holdings: &HashSet<String>,
    ) -> Result<ProfileBatch, AnalysisError> {
        let unique: BTreeSet<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        let mut batch = ProfileBatch::default();

        for symbol in unique {
            match self.analysis_profile(&symbol).await {
                Ok(profile) => {
                    batch.profiles.insert(symbol, profile);
                }
                Err(e) if e.is_per_instrument() => {
                    warn!("Excluding {} from analysis: {}", symbol, e);
                    batch.failed_symbols.push(symbol);
                }
                Err(e) => return Err(e),
            }
        }

        batch.scores = scorer::score_profiles(&batch.profiles, risk_tolerance, holdings);
        info!(
            "Profiled {} instruments, {} excluded",
            batch.profiles.len(),
            batch.failed_symbols.len()
        );
        Ok(batch)
    }

    /// # Summary
    /// 在已计算的画像上执行配置优化。
    ///
    /// # Arguments
    /// * `batch`: 画像与得分。
    /// * `risk_tolerance`: 风险偏好。
    /// * `strategy`: 得分比例或均值-方差。
    /// * `current_holdings`: 当前持仓代码，约束不可行时退化为其等权。
    pub fn allocate(
        &self,
        batch: &ProfileBatch,
        risk_tolerance: f64,
        strategy: AllocationStrategy,
        current_holdings: &[String],
    ) -> Result<AllocationPlan, AnalysisError> {
        let settings = OptimizerSettings::from(&self.config);
        let plan = match strategy {
            AllocationStrategy::ScoreProportional => {
                optimizer::score_proportional(&batch.scores, risk_tolerance, &settings, current_holdings)
            }
            AllocationStrategy::MeanVariance => {
                optimizer::mean_variance(&batch.profiles, risk_tolerance, &settings, current_holdings)
            }
        }?;
        info!(
            "Allocated {} instruments with {} strategy (fallback: {})",
            plan.weights.len(),
            strategy,
            plan.fallback
        );
        Ok(plan)
    }

    /// # Summary
    /// 对一组候选代码计算画像并给出目标配置。
    pub async fn optimize_allocation(
        &self,
        symbols: &[String],
        risk_tolerance: f64,
        strategy: AllocationStrategy,
        current_holdings: &[String],
    ) -> Result<AllocationPlan, AnalysisError> {
        let held: HashSet<String> = current_holdings.iter().map(|s| normalize_symbol(s)).collect();
        let batch = self
            .compute_analysis_profiles(symbols, risk_tolerance, &held)
            .await?;
        self.allocate(&batch, risk_tolerance, strategy, current_holdings)
    }

    /// # Summary
    /// 对比组合与目标配置生成调仓指令，报价取自画像中的最新收盘价。
    pub fn generate_action_plan(
        &self,
        portfolio: &Portfolio,
        plan: &AllocationPlan,
        quotes: &HashMap<String, f64>,
    ) -> Result<Vec<StockAction>, AnalysisError> {
        action::generate_action_plan(portfolio, plan, quotes)
    }

    pub fn diversification_score(&self, portfolio: &Portfolio) -> f64 {
        metrics::diversification_score(portfolio)
    }

    pub fn risk_score(&self, portfolio: &Portfolio) -> f64 {
        metrics::risk_score(portfolio)
    }

    /// 已有画像时使用的风险评分，叠加日波动率。
    pub fn risk_score_with_profiles(&self, portfolio: &Portfolio, batch: &ProfileBatch) -> f64 {
        let volatilities: HashMap<String, f64> = batch
            .profiles
            .iter()
            .map(|(symbol, p)| (symbol.clone(), p.volatility))
            .collect();
        metrics::risk_score_with_volatility(portfolio, &volatilities)
    }
}

/// 从画像中提取最新报价。
pub fn quotes_of(batch: &ProfileBatch) -> HashMap<String, f64> {
    batch
        .profiles
        .iter()
        .map(|(symbol, p)| (symbol.clone(), p.current_price))
        .collect()
}
