pub mod fixtures;

use fixtures::{harness, harness_with_save_delay, scenario_holdings, start, today};
use folio_core::analysis::error::AnalysisError;
use folio_core::indicator::port::IndicatorStore;
use folio_core::portfolio::entity::{ActionKind, Holding, OptimizationStatus};
use folio_core::portfolio::port::PortfolioStore;
use folio_core::portfolio::error::StatusError;
use folio_manager::error::ManagerError;
use folio_manager::portfolio::recommendation_key;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_recommendation_scenario() {
    let h = harness();
    h.manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    let rec = h.manager.get_recommendations("p1", 0.5, false).await.unwrap();
    assert!(rec.plan.weight("AAPL") > rec.plan.weight("MSFT"));
    assert!(rec.scores["AAPL"] > rec.scores["MSFT"]);
    assert!(rec.failed_symbols.is_empty());

    let msft = rec.actions.iter().find(|a| a.symbol == "MSFT").unwrap();
    assert_eq!(msft.action, ActionKind::Sell);
    let aapl = rec.actions.iter().find(|a| a.symbol == "AAPL").unwrap();
    assert_eq!(aapl.action, ActionKind::Buy);
    assert!(!aapl.reason.is_empty());
}

#[tokio::test]
async fn test_recommendations_are_memoized_and_invalidated() {
    let h = harness();
    h.manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    let first = h.manager.get_recommendations("p1", 0.5, false).await.unwrap();
    let calls = h.forecasts.calls();
    assert_eq!(calls, 2);
    let second = h.manager.get_recommendations("p1", 0.5, false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.forecasts.calls(), calls);

    // 风险偏好不同即为不同的键
    h.manager.get_recommendations("p1", 0.8, false).await.unwrap();
    assert_eq!(h.cache.len(), 2);
    assert_eq!(recommendation_key("p1", 0.5, false), "recommendation:p1:0.5000:false");

    let applied = h.manager.apply_recommendations("p1", 0.5, false).await.unwrap();
    assert_eq!(applied.optimization_status, OptimizationStatus::UpgradedWithAi);
    assert!(applied.last_optimized_at.is_some());
    assert!(applied.holding("MSFT").map_or(0.0, |m| m.shares) < 50.0);
    assert!(applied.holding("AAPL").unwrap().shares > 100.0);
    assert!(h.cache.is_empty());

    let stored = h.manager.portfolio("p1").await.unwrap();
    assert_eq!(stored, applied);
}

#[tokio::test]
async fn test_expanded_universe_absorbs_failures() {
    let h = harness();
    h.manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    let spawned = h.manager.spawn_recommendations("p1", 0.5, true);
    let rec = spawned.await.unwrap().unwrap();
    assert!(rec.expand_universe);
    assert_eq!(rec.failed_symbols, vec!["DOWN".to_string(), "GHOST".to_string()]);
    assert!(rec.scores.contains_key("NVDA"));
    assert!(rec.plan.weight("NVDA") > 0.0);
    let nvda = rec.actions.iter().find(|a| a.symbol == "NVDA").unwrap();
    assert_eq!(nvda.action, ActionKind::Buy);
    assert_eq!(nvda.current_shares, 0.0);

    // 结果已写入缓存
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn test_background_optimization_lifecycle() {
    let h = harness();
    h.manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    h.manager.start_optimization("p1", 0.5).await.unwrap();
    let mut status = h.manager.portfolio("p1").await.unwrap().optimization_status;
    for _ in 0..100 {
        if status != OptimizationStatus::Optimizing {
            break;
        }
        sleep(Duration::from_millis(20)).await;
        status = h.manager.portfolio("p1").await.unwrap().optimization_status;
    }
    assert_eq!(status, OptimizationStatus::Optimized);
    assert!(!h.manager.is_running("p1"));

    let optimized = h.manager.portfolio("p1").await.unwrap();
    assert!(optimized.last_optimized_at.is_some());
    assert!(optimized.holding("AAPL").unwrap().weight > 0.5);
    assert!((0.0..=100.0).contains(&optimized.risk_score));

    // 编辑持仓回到 NOT_OPTIMIZED
    let edited = h
        .manager
        .update_holdings(
            "p1",
            vec![Holding::new("aapl", 10.0, 150.0, start(), 150.0)],
        )
        .await
        .unwrap();
    assert_eq!(edited.optimization_status, OptimizationStatus::NotOptimized);
    assert_eq!(edited.holdings[0].symbol, "AAPL");
    assert_eq!(edited.total_value, 1500.0);
}

#[tokio::test]
async fn test_zero_value_portfolio_fails_optimization() {
    let h = harness();
    h.manager.create_portfolio("empty", "bob", Vec::new()).await.unwrap();

    let err = h.manager.start_optimization("empty", 0.5).await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Analysis(AnalysisError::PortfolioState(_))
    ));
    let stored = h.manager.portfolio("empty").await.unwrap();
    assert_eq!(stored.optimization_status, OptimizationStatus::OptimizationFailed);

    // 组合层面的失败同样上报给推荐调用方
    assert!(h.manager.get_recommendations("empty", 0.5, false).await.is_err());
}

#[tokio::test]
async fn test_apply_to_unusable_portfolio_records_failure() {
    let h = harness();
    h.manager.create_portfolio("empty", "bob", Vec::new()).await.unwrap();
    let err = h.manager.apply_recommendations("empty", 0.5, false).await.unwrap_err();
    assert!(matches!(err, ManagerError::Analysis(AnalysisError::NoCandidates)));
    assert_eq!(
        h.manager.portfolio("empty").await.unwrap().optimization_status,
        OptimizationStatus::OptimizationFailed
    );

    // 无行情的持仓退化为等权，但总市值为 0
    h.manager
        .create_portfolio("ghost", "bob", vec![Holding::new("GHOST", 10.0, 5.0, start(), 0.0)])
        .await
        .unwrap();
    let err = h.manager.apply_recommendations("ghost", 0.5, false).await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Analysis(AnalysisError::PortfolioState(_))
    ));
    let stored = h.manager.portfolio("ghost").await.unwrap();
    assert_eq!(stored.optimization_status, OptimizationStatus::OptimizationFailed);
    assert_eq!(stored.holding("GHOST").unwrap().shares, 10.0);
}

#[tokio::test]
async fn test_status_guards() {
    let h = harness();
    let mut portfolio = h
        .manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    let err = h.manager.start_optimization("p1", 1.5).await.unwrap_err();
    assert!(matches!(err, ManagerError::InvalidRiskTolerance(_)));

    // 模拟一次中断后遗留的 OPTIMIZING 状态
    portfolio.optimization_status = OptimizationStatus::Optimizing;
    h.store.save_portfolio(&portfolio).await.unwrap();
    let err = h.manager.apply_recommendations("p1", 0.5, false).await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Status(StatusError::AlreadyOptimizing)
    ));
    assert_eq!(
        h.manager.portfolio("p1").await.unwrap().optimization_status,
        OptimizationStatus::Optimizing
    );

    // 没有存活任务时允许重新开始
    h.manager.start_optimization("p1", 0.5).await.unwrap();
    assert!(matches!(
        h.manager.start_optimization("p1", 0.5).await,
        Err(ManagerError::AlreadyRunning(_))
    ));
}

#[tokio::test]
async fn test_compute_indicators_idempotent() {
    let h = harness();
    let analysis = h.manager.analysis();
    let from = today() - chrono::Days::new(30);

    let first = analysis.compute_indicators("AAPL", from, today()).await.unwrap();
    let second = analysis.compute_indicators("aapl", from, today()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 31);

    let stored = h.indicators.load_range("AAPL", start(), today()).await.unwrap();
    assert_eq!(stored, first);
    // 预热后 SMA20 不再是冷启动回退值
    assert_ne!(first[0].sma20, first[0].price);

    let empty = analysis.compute_indicators("NONE", from, today()).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_concurrent_starts_admit_single_run() {
    let h = harness_with_save_delay(Duration::from_millis(20));
    h.manager
        .create_portfolio("p1", "alice", scenario_holdings())
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        h.manager.start_optimization("p1", 0.5),
        h.manager.start_optimization("p1", 0.5)
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(ManagerError::AlreadyRunning(_))))
            .count(),
        1
    );
    assert!(h.manager.is_running("p1"));

    for _ in 0..200 {
        if !h.manager.is_running("p1") {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(!h.manager.is_running("p1"));
    assert_eq!(
        h.manager.portfolio("p1").await.unwrap().optimization_status,
        OptimizationStatus::Optimized
    );

    // 槽位释放后可以再次启动
    h.manager.start_optimization("p1", 0.5).await.unwrap();
}

#[tokio::test]
async fn test_failed_start_releases_slot() {
    let h = harness();
    h.manager.create_portfolio("empty", "bob", Vec::new()).await.unwrap();
    assert!(h.manager.start_optimization("empty", 0.5).await.is_err());
    assert!(!h.manager.is_running("empty"));
    // 再次启动得到同样的组合级错误，而不是 AlreadyRunning
    let err = h.manager.start_optimization("empty", 0.5).await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Analysis(AnalysisError::PortfolioState(_))
    ));
}
