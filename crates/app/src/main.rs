use std::path::PathBuf;
use std::sync::Arc;

use chrono::Days;
use folio_cache::mem::MemCache;
use folio_core::common::time::{RealTimeProvider, TimeProvider};
use folio_core::config::AppConfig;
use folio_forecast::trend::TrendForecaster;
use folio_manager::analysis::AnalysisService;
use folio_manager::portfolio::PortfolioManager;
use folio_store::indicator::SqliteIndicatorStore;
use folio_store::market::SqlitePriceStore;
use folio_store::portfolio::SqlitePortfolioStore;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// # Summary
/// 加载分层配置。
///
/// # Logic
/// 1. 可选的 `config/default.toml`。
/// 2. 可选的 `config/local.toml` 覆盖默认值。
/// 3. `FOLIO__` 前缀的环境变量最后覆盖，例如 `FOLIO__ANALYTICS__MAX_ALLOCATION=0.3`。
/// 4. 缺失的字段回退到 `AppConfig::default()`。
fn load_config() -> Result<AppConfig, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name("config/local").required(false))
        .add_source(config::Environment::with_prefix("FOLIO").separator("__"))
        .build()?
        .try_deserialize()
}

/// # Summary
/// 初始化日志：标准输出 + 按天滚动的文件，`RUST_LOG` 优先于配置。
///
/// # Returns
/// 文件写入线程的守卫，需持有到进程退出以保证日志落盘。
fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&config.log.dir, "folio.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    guard
}

/// # Summary
/// 为标的池重算最近 `lookback_days` 的技术指标，单个标的失败只记录告警。
async fn warm_up_indicators(
    analysis: &AnalysisService,
    clock: &dyn TimeProvider,
    symbols: &[String],
) {
    let today = clock.today();
    let lookback = u64::try_from(analysis.config().lookback_days).unwrap_or(0);
    let from = today.checked_sub_days(Days::new(lookback)).unwrap_or(today);

    for symbol in symbols {
        match analysis.compute_indicators(symbol, from, today).await {
            Ok(frames) => info!("Warmed up {} indicator frames for {}", frames.len(), symbol),
            Err(e) => warn!("Skipping indicator warm-up for {}: {}", symbol, e),
        }
    }
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入到应用服务层。
///
/// # Logic
/// 1. 加载配置并初始化全局日志。
/// 2. 实例化基础设施层（Store、Cache、Forecast）。
/// 3. 构造应用服务层（AnalysisService、PortfolioManager）。
/// 4. 预热标的池的技术指标。
/// 5. 挂起等待外部信号退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = load_config()?;
    let _guard = init_logging(&config);
    info!("Folio starting...");

    // 2. 基础设施层
    if !folio_store::config::set_root_dir(PathBuf::from(&config.database.data_dir)) {
        warn!("Store root directory was already set; ignoring {}", config.database.data_dir);
    }
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
    let prices = Arc::new(SqlitePriceStore::new()?);
    let indicators = Arc::new(SqliteIndicatorStore::new()?);
    let portfolios = Arc::new(SqlitePortfolioStore::new().await?);
    let cache = Arc::new(MemCache::new());
    let forecaster = Arc::new(TrendForecaster::new(
        prices.clone(),
        clock.clone(),
        config.forecast.clone(),
    ));

    // 3. 应用服务层（注入 Core Trait 抽象）
    let analysis = Arc::new(AnalysisService::new(
        prices,
        forecaster,
        indicators,
        clock.clone(),
        config.analytics.clone(),
    ));
    let manager = PortfolioManager::new(
        analysis.clone(),
        portfolios,
        cache,
        clock.clone(),
        config.universe.symbols.clone(),
    );

    // 4. 预热指标
    warm_up_indicators(&analysis, clock.as_ref(), &config.universe.symbols).await;
    info!(
        "PortfolioManager initialized with {} universe symbols. Waiting for signals...",
        config.universe.symbols.len()
    );

    // 5. 挂起主线程，等待外部退出信号
    tokio::signal::ctrl_c().await?;
    drop(manager);
    info!("Shutdown signal received. Exiting...");

    Ok(())
}
