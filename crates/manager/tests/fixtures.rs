use async_trait::async_trait;
use chrono::{Days, NaiveDate, TimeZone, Utc};
use folio_cache::mem::MemCache;
use folio_core::common::time::FakeClockProvider;
use folio_core::config::AnalyticsConfig;
use folio_core::forecast::entity::Forecast;
use folio_core::forecast::error::ForecastError;
use folio_core::forecast::port::ForecastProvider;
use folio_core::portfolio::entity::{Holding, Portfolio};
use folio_core::portfolio::port::PortfolioStore;
use folio_core::store::error::StoreError;
use folio_core::testing::{StaticForecasts, StaticPriceHistory, bars_from_closes};
use folio_manager::analysis::AnalysisService;
use folio_manager::portfolio::PortfolioManager;
use folio_store::indicator::SqliteIndicatorStore;
use folio_store::memory::MemoryPortfolioStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const HISTORY_DAYS: u32 = 200;

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// 行情最后一天
pub fn today() -> NaiveDate {
    start() + Days::new(u64::from(HISTORY_DAYS - 1))
}

/// 计数包装，用于观察推荐是否命中缓存
pub struct CountingForecasts {
    inner: StaticForecasts,
    pub calls: AtomicUsize,
}

impl CountingForecasts {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for CountingForecasts {
    async fn forecast(&self, symbol: &str) -> Result<Forecast, ForecastError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.forecast(symbol).await
    }
}

/// 保存前先让出执行权，模拟慢速持久化
pub struct SlowSaveStore {
    inner: Arc<MemoryPortfolioStore>,
    delay: Duration,
}

#[async_trait]
impl PortfolioStore for SlowSaveStore {
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save_portfolio(portfolio).await
    }

    async fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError> {
        self.inner.load_portfolio(id).await
    }

    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, StoreError> {
        self.inner.list_portfolios(owner).await
    }

    async fn delete_portfolio(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete_portfolio(owner, id).await
    }
}

// 上升趋势，收于 150
fn uptrend() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..HISTORY_DAYS - 1)
        .map(|i| 130.0 + 0.1 * f64::from(i) + if i % 2 == 0 { 0.4 } else { -0.4 })
        .collect();
    closes.push(150.0);
    closes
}

// 下降趋势，收于 300
fn downtrend() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..HISTORY_DAYS - 1)
        .map(|i| 320.0 - 0.1 * f64::from(i) + if i % 2 == 0 { 1.5 } else { -1.5 })
        .collect();
    closes.push(300.0);
    closes
}

pub struct Harness {
    pub manager: Arc<PortfolioManager>,
    pub cache: Arc<MemCache>,
    pub forecasts: Arc<CountingForecasts>,
    pub indicators: Arc<SqliteIndicatorStore>,
    pub store: Arc<MemoryPortfolioStore>,
    pub _tmp: TempDir,
}

pub fn harness() -> Harness {
    build_harness(None)
}

/// 组合保存带延迟的测试环境，`Harness::store` 仍指向底层内存存储
pub fn harness_with_save_delay(delay: Duration) -> Harness {
    build_harness(Some(delay))
}

fn build_harness(save_delay: Option<Duration>) -> Harness {
    let tmp = tempfile::tempdir().unwrap();

    let prices = StaticPriceHistory::new();
    prices.insert("AAPL", bars_from_closes("AAPL", start(), &uptrend()));
    prices.insert("MSFT", bars_from_closes("MSFT", start(), &downtrend()));
    prices.insert("NVDA", bars_from_closes("NVDA", start(), &uptrend()));
    prices.fail_on("DOWN");

    let inner = StaticForecasts::new();
    inner.insert("AAPL", today(), 150.0, 8.0, 70.0);
    inner.insert("MSFT", today(), 300.0, -4.0, 70.0);
    inner.insert("NVDA", today(), 150.0, 12.0, 60.0);
    inner.insert("DOWN", today(), 10.0, 5.0, 50.0);
    let forecasts = Arc::new(CountingForecasts {
        inner,
        calls: AtomicUsize::new(0),
    });

    let indicators = Arc::new(SqliteIndicatorStore::with_base_path(tmp.path()).unwrap());
    let clock = Arc::new(FakeClockProvider::new(
        Utc.from_utc_datetime(&today().and_hms_opt(21, 0, 0).unwrap()),
    ));
    let analysis = Arc::new(AnalysisService::new(
        Arc::new(prices),
        forecasts.clone(),
        indicators.clone(),
        clock.clone(),
        AnalyticsConfig::default(),
    ));
    let cache = Arc::new(MemCache::new());
    let store = Arc::new(MemoryPortfolioStore::new());
    let manager_store: Arc<dyn PortfolioStore> = match save_delay {
        Some(delay) => Arc::new(SlowSaveStore {
            inner: store.clone(),
            delay,
        }),
        None => store.clone(),
    };
    let manager = PortfolioManager::new(
        analysis,
        manager_store,
        cache.clone(),
        clock,
        vec!["nvda".to_string(), "DOWN".to_string(), "GHOST".to_string()],
    );

    Harness {
        manager,
        cache,
        forecasts,
        indicators,
        store,
        _tmp: tmp,
    }
}

pub fn scenario_holdings() -> Vec<Holding> {
    vec![
        Holding::new("AAPL", 100.0, 150.0, start(), 150.0),
        Holding::new("MSFT", 50.0, 300.0, start(), 300.0),
    ]
}
