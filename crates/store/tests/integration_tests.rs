use chrono::{Days, NaiveDate, Utc};
use folio_core::indicator::entity::IndicatorFrame;
use folio_core::indicator::port::IndicatorStore;
use folio_core::market::entity::PriceBar;
use folio_core::market::port::PriceHistoryProvider;
use folio_core::portfolio::entity::{Holding, OptimizationStatus, Portfolio};
use folio_core::portfolio::port::PortfolioStore;
use folio_core::store::error::StoreError;
use folio_store::indicator::SqliteIndicatorStore;
use folio_store::market::SqlitePriceStore;
use folio_store::memory::MemoryPortfolioStore;
use folio_store::portfolio::SqlitePortfolioStore;
use tempfile::tempdir;

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
}

fn frame(symbol: &str, date: NaiveDate, price: f64) -> IndicatorFrame {
    IndicatorFrame {
        symbol: symbol.to_string(),
        date,
        price,
        sma20: price,
        sma50: price,
        sma200: price,
        rsi14: 50.0,
        macd_line: 0.0,
        macd_signal: 0.0,
        macd_histogram: 0.0,
        bollinger_upper: price * 1.02,
        bollinger_middle: price,
        bollinger_lower: price * 0.98,
    }
}

#[tokio::test]
async fn test_price_store_roundtrip_and_range() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let store = SqlitePriceStore::with_base_path(tmp.path().join("market"))?;

    let bars: Vec<PriceBar> = (0..10u32)
        .map(|i| PriceBar::from_close("aapl", day(u64::from(i)), 100.0 + f64::from(i)))
        .collect();
    store.save_bars("AAPL", &bars).await?;
    // 重复写入同一交易日覆盖旧值
    store
        .save_bars("AAPL", &[PriceBar::from_close("AAPL", day(9), 200.0)])
        .await?;

    let loaded = store.get_price_history("aapl", day(2), day(9)).await?;
    assert_eq!(loaded.len(), 8);
    assert_eq!(loaded[0].date, day(2));
    assert_eq!(loaded[0].symbol, "AAPL");
    assert_eq!(loaded[7].close, 200.0);

    let empty = store.get_price_history("MSFT", day(0), day(9)).await?;
    assert!(empty.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_indicator_replace_range_is_idempotent() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let store = SqliteIndicatorStore::with_base_path(tmp.path())?;

    let frames: Vec<IndicatorFrame> = (0..5).map(|i| frame("AAPL", day(i), 10.0)).collect();
    store.replace_range("AAPL", day(0), day(4), &frames).await?;
    store.replace_range("AAPL", day(0), day(4), &frames).await?;
    let loaded = store.load_range("AAPL", day(0), day(10)).await?;
    assert_eq!(loaded, frames);

    // 区间替换丢弃旧帧而不是合并
    let fewer: Vec<IndicatorFrame> = (2..4).map(|i| frame("AAPL", day(i), 20.0)).collect();
    store.replace_range("AAPL", day(1), day(3), &fewer).await?;
    let loaded = store.load_range("AAPL", day(0), day(10)).await?;
    let dates: Vec<NaiveDate> = loaded.iter().map(|f| f.date).collect();
    assert_eq!(dates, vec![day(0), day(2), day(3), day(4)]);
    assert_eq!(loaded[1].price, 20.0);
    assert_eq!(loaded[3].price, 10.0);
    Ok(())
}

fn sample_portfolio(id: &str, owner: &str) -> Portfolio {
    Portfolio::with_holdings(
        id,
        owner,
        vec![
            Holding::new("AAPL", 100.0, 140.0, day(0), 150.0),
            Holding::new("MSFT", 50.0, 300.0, day(1), 300.0),
        ],
    )
}

#[tokio::test]
async fn test_sqlite_portfolio_store() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let store = SqlitePortfolioStore::with_root(tmp.path()).await?;

    let mut portfolio = sample_portfolio("p1", "alice");
    portfolio.optimization_status = OptimizationStatus::UpgradedWithAi;
    portfolio.last_optimized_at = Some(Utc::now());
    portfolio.risk_score = 50.0;
    store.save_portfolio(&portfolio).await?;
    store.save_portfolio(&sample_portfolio("p2", "alice")).await?;
    store.save_portfolio(&sample_portfolio("p3", "bob")).await?;

    let loaded = store.load_portfolio("p1").await?;
    assert_eq!(loaded.optimization_status, OptimizationStatus::UpgradedWithAi);
    assert_eq!(loaded.total_value, 30000.0);
    assert_eq!(loaded.total_return, 1000.0);
    assert_eq!(loaded.holdings.len(), 2);
    assert!((loaded.holding("AAPL").unwrap().weight - 0.5).abs() < 1e-12);
    assert!(loaded.last_optimized_at.is_some());

    // 覆盖保存会移除不再存在的持仓
    let mut trimmed = loaded.clone();
    trimmed.holdings.retain(|h| h.symbol == "AAPL");
    trimmed.revalue();
    store.save_portfolio(&trimmed).await?;
    assert_eq!(store.load_portfolio("p1").await?.holdings.len(), 1);

    let alice = store.list_portfolios("alice").await?;
    assert_eq!(alice.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["p1", "p2"]);

    assert!(matches!(
        store.delete_portfolio("bob", "p1").await,
        Err(StoreError::NotFound(_))
    ));
    store.delete_portfolio("alice", "p1").await?;
    assert!(matches!(
        store.load_portfolio("p1").await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_memory_portfolio_store() -> anyhow::Result<()> {
    let store = MemoryPortfolioStore::new();
    store.save_portfolio(&sample_portfolio("p1", "alice")).await?;
    assert_eq!(store.load_portfolio("p1").await?.total_value, 30000.0);
    assert_eq!(store.list_portfolios("alice").await?.len(), 1);
    assert!(store.list_portfolios("bob").await?.is_empty());
    assert!(store.delete_portfolio("bob", "p1").await.is_err());
    store.delete_portfolio("alice", "p1").await?;
    assert!(matches!(
        store.load_portfolio("p1").await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}
