use crate::analysis::{AnalysisService, quotes_of};
use crate::error::ManagerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use folio_analytics::action::apply_action_plan;
use folio_analytics::metrics;
use folio_core::analysis::entity::{AllocationStrategy, ProfileBatch, Recommendation};
use folio_core::analysis::error::AnalysisError;
use folio_core::cache::port::{Cache, CacheExt};
use folio_core::common::normalize_symbol;
use folio_core::common::time::TimeProvider;
use folio_core::portfolio::entity::{Holding, Portfolio, StatusEvent};
use folio_core::portfolio::port::PortfolioStore;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

/// # Summary
/// 推荐结果的缓存键 `recommendation:{组合}:{风险偏好}:{是否扩展标的池}`。
pub fn recommendation_key(portfolio_id: &str, risk_tolerance: f64, expand_universe: bool) -> String {
    format!(
        "{}{:.4}:{}",
        recommendation_prefix(portfolio_id),
        risk_tolerance,
        expand_universe
    )
}

/// 某组合全部推荐缓存的公共前缀。
pub fn recommendation_prefix(portfolio_id: &str) -> String {
    format!("recommendation:{}:", portfolio_id)
}

fn validate_risk_tolerance(risk_tolerance: f64) -> Result<(), ManagerError> {
    if (0.0..=1.0).contains(&risk_tolerance) {
        Ok(())
    } else {
        Err(ManagerError::InvalidRiskTolerance(risk_tolerance))
    }
}

// 以画像中的最新收盘价刷新持仓现价
fn mark_to_market(portfolio: &mut Portfolio, batch: &ProfileBatch) {
    for holding in &mut portfolio.holdings {
        if let Some(profile) = batch.profiles.get(&holding.symbol) {
            holding.current_price = profile.current_price;
        }
    }
    portfolio.revalue();
}

// 优化任务槽位。`handle` 为 None 表示已占位、任务尚未派发
struct TaskSlot {
    run: u64,
    handle: Option<AbortHandle>,
}

/// # Summary
/// 组合管理器，组合优化与 AI 推荐的应用服务层门面 (Facade)。
///
/// # Invariants
/// - 同一组合同时至多一个后台优化任务，通过 `AbortHandle` 跟踪。
/// - 优化状态持久化在组合上，调用方通过 `portfolio` 轮询观察。
/// - 任何改变持仓的操作都会批量失效该组合的推荐缓存。
pub struct PortfolioManager {
    analysis: Arc<AnalysisService>,
    store: Arc<dyn PortfolioStore>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn TimeProvider>,
    // 扩展标的池时追加的候选
    universe: Vec<String>,
    // 运行中的优化任务，Key 为组合 ID
    running_tasks: Arc<DashMap<String, TaskSlot>>,
    next_run: AtomicU64,
}

impl PortfolioManager {
    /// # Summary
    /// 创建 PortfolioManager 实例。
    ///
    /// # Returns
    /// * `Arc<Self>` - 可共享的管理器实例，后台任务持有其克隆。
    pub fn new(
        analysis: Arc<AnalysisService>,
        store: Arc<dyn PortfolioStore>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn TimeProvider>,
        universe: Vec<String>,
    ) -> Arc<Self> {
        let universe = universe
            .iter()
            .map(|s| normalize_symbol(s))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Arc::new(Self {
            analysis,
            store,
            cache,
            clock,
            universe,
            running_tasks: Arc::new(DashMap::new()),
            next_run: AtomicU64::new(0),
        })
    }

    pub fn analysis(&self) -> &AnalysisService {
        &self.analysis
    }

    /// 读取组合当前状态。
    pub async fn portfolio(&self, id: &str) -> Result<Portfolio, ManagerError> {
        Ok(self.store.load_portfolio(id).await?)
    }

    /// # Summary
    /// 新建并保存一个组合。
    pub async fn create_portfolio(
        &self,
        id: &str,
        owner: &str,
        holdings: Vec<Holding>,
    ) -> Result<Portfolio, ManagerError> {
        let mut portfolio = Portfolio::with_holdings(id, owner, holdings);
        portfolio.risk_score = metrics::risk_score(&portfolio);
        self.store.save_portfolio(&portfolio).await?;
        info!("Created portfolio {} for {}", id, owner);
        Ok(portfolio)
    }

    /// # Summary
    /// 删除组合并清理其推荐缓存，只允许归属用户执行。
    pub async fn delete_portfolio(&self, owner: &str, id: &str) -> Result<(), ManagerError> {
        self.abort_run(id);
        self.store.delete_portfolio(owner, id).await?;
        self.invalidate(id).await
    }

    /// 该组合是否有正在运行的后台优化。
    pub fn is_running(&self, id: &str) -> bool {
        self.running_tasks.contains_key(id)
    }

    // 在第一个 await 之前占住槽位，同一组合的并发启动只有一个能通过
    fn reserve_run(&self, id: &str) -> Result<u64, ManagerError> {
        match self.running_tasks.entry(id.to_string()) {
            Entry::Occupied(_) => Err(ManagerError::AlreadyRunning(id.to_string())),
            Entry::Vacant(vacant) => {
                let run = self.next_run.fetch_add(1, Ordering::Relaxed);
                vacant.insert(TaskSlot { run, handle: None });
                Ok(run)
            }
        }
    }

    // 只释放本次运行的槽位，不影响之后重新占位的运行
    fn release_run(&self, id: &str, run: u64) {
        self.running_tasks.remove_if(id, |_, slot| slot.run == run);
    }

    // 把任务句柄挂到本次运行的槽位上；槽位已被释放或中止时返回 false
    fn attach_run(&self, id: &str, run: u64, handle: AbortHandle) -> bool {
        match self.running_tasks.get_mut(id) {
            Some(mut slot) if slot.run == run => {
                slot.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// 中止该组合正在进行的优化，返回是否存在运行。
    fn abort_run(&self, id: &str) -> bool {
        match self.running_tasks.remove(id) {
            Some((_, slot)) => {
                if let Some(handle) = slot.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    async fn invalidate(&self, id: &str) -> Result<(), ManagerError> {
        let removed = self.cache.del_prefix(&recommendation_prefix(id)).await?;
        if removed > 0 {
            info!("Invalidated {} cached recommendations for {}", removed, id);
        }
        Ok(())
    }

    fn candidates(&self, portfolio: &Portfolio, expand_universe: bool) -> Vec<String> {
        let mut symbols: BTreeSet<String> = portfolio.symbols().into_iter().collect();
        if expand_universe {
            symbols.extend(self.universe.iter().cloned());
        }
        symbols.into_iter().collect()
    }

    /// # Summary
    /// 启动一次后台优化。
    ///
    /// # Logic
    /// 1. 校验风险偏好，同步占住该组合的任务槽位，已被占用则拒绝。
    /// 2. 组合状态停留在 OPTIMIZING 却无任务跟踪时，视为上次运行中断，先记为失败。
    /// 3. 总市值非正：状态迁移到 OPTIMIZATION_FAILED 并持久化，释放槽位并向调用方返回错误。
    /// 4. 状态迁移到 OPTIMIZING 并持久化后 `tokio::spawn` 执行，句柄挂到槽位上，立即返回。
    /// 5. 任务结束后迁移到 OPTIMIZED 或 OPTIMIZATION_FAILED 并释放槽位。
    ///
    /// # Arguments
    /// * `id` - 组合 ID。
    /// * `risk_tolerance` - 风险偏好 ∈ [0, 1]。
    ///
    /// # Returns
    /// * `Result<(), ManagerError>` - 成功仅表示任务已受理。
    pub async fn start_optimization(
        self: &Arc<Self>,
        id: &str,
        risk_tolerance: f64,
    ) -> Result<(), ManagerError> {
        validate_risk_tolerance(risk_tolerance)?;
        let run = self.reserve_run(id)?;
        if let Err(e) = self.begin_run(id, risk_tolerance).await {
            self.release_run(id, run);
            return Err(e);
        }

        let manager = Arc::clone(self);
        let task_id = id.to_string();
        let handle: JoinHandle<()> = tokio::spawn(async move {
            if let Err(e) = manager.run_optimization(&task_id, risk_tolerance).await {
                error!("Optimization of {} failed: {}", task_id, e);
                if let Err(e) = manager.mark_failed(&task_id).await {
                    error!("Could not record failure of {}: {}", task_id, e);
                }
            }
            manager.release_run(&task_id, run);
        });

        // 派发前槽位已被中止 (例如持仓被编辑) 时，本次运行作废
        if !self.attach_run(id, run, handle.abort_handle()) && !handle.is_finished() {
            warn!("Optimization of {} was cancelled before it started", id);
            handle.abort();
        }
        Ok(())
    }

    // 持久化 OPTIMIZING 状态，调用方已占住槽位
    async fn begin_run(&self, id: &str, risk_tolerance: f64) -> Result<(), ManagerError> {
        let mut portfolio = self.store.load_portfolio(id).await?;
        if portfolio.optimization_status.is_optimizing() {
            warn!("Portfolio {} was left OPTIMIZING without a live task", id);
            portfolio.apply_event(StatusEvent::Fail)?;
        }

        portfolio.apply_event(StatusEvent::Start)?;
        if portfolio.total_value <= 0.0 {
            portfolio.apply_event(StatusEvent::Fail)?;
            self.store.save_portfolio(&portfolio).await?;
            error!("Portfolio {} has no value to optimize", id);
            return Err(AnalysisError::PortfolioState(format!(
                "portfolio {} has non-positive total value {:.2}",
                id, portfolio.total_value
            ))
            .into());
        }
        self.store.save_portfolio(&portfolio).await?;
        info!("Optimization of {} started (risk tolerance {:.2})", id, risk_tolerance);
        Ok(())
    }

    /// # Summary
    /// 后台优化主体。
    ///
    /// # Logic
    /// 1. 对当前持仓计算画像，以最新收盘价重估组合。
    /// 2. 均值-方差搜索得到目标配置，生成调仓指令并应用到持仓。
    /// 3. 状态迁移到 OPTIMIZED，记录优化时间，持久化并失效推荐缓存。
    async fn run_optimization(&self, id: &str, risk_tolerance: f64) -> Result<(), ManagerError> {
        let mut portfolio = self.store.load_portfolio(id).await?;
        let symbols = portfolio.symbols();
        let held: HashSet<String> = symbols.iter().cloned().collect();

        let batch = self
            .analysis
            .compute_analysis_profiles(&symbols, risk_tolerance, &held)
            .await?;
        mark_to_market(&mut portfolio, &batch);

        let plan = self.analysis.allocate(
            &batch,
            risk_tolerance,
            AllocationStrategy::MeanVariance,
            &symbols,
        )?;
        let actions = self
            .analysis
            .generate_action_plan(&portfolio, &plan, &quotes_of(&batch))?;

        let mut optimized = apply_action_plan(&portfolio, &actions, self.clock.today());
        optimized.risk_score = self.analysis.risk_score_with_profiles(&optimized, &batch);
        optimized.apply_event(StatusEvent::Complete)?;
        optimized.last_optimized_at = Some(self.clock.now());
        self.store.save_portfolio(&optimized).await?;
        self.invalidate(id).await?;
        info!(
            "Optimization of {} completed: {} actions, value {:.2}",
            id,
            actions.len(),
            optimized.total_value
        );
        Ok(())
    }

    async fn mark_failed(&self, id: &str) -> Result<(), ManagerError> {
        let mut portfolio = self.store.load_portfolio(id).await?;
        portfolio.apply_event(StatusEvent::Fail)?;
        self.store.save_portfolio(&portfolio).await?;
        Ok(())
    }

    /// # Summary
    /// 获取 AI 推荐，按 (组合, 风险偏好, 是否扩展标的池) 记忆化。
    ///
    /// # Logic
    /// 1. 命中缓存直接返回；缓存内容损坏时告警并重新计算。
    /// 2. 计算候选 (持仓，可选追加标的池) 的画像与得分。
    /// 3. 得分比例配置，生成调仓指令。
    /// 4. 写入缓存后返回。
    pub async fn get_recommendations(
        &self,
        id: &str,
        risk_tolerance: f64,
        expand_universe: bool,
    ) -> Result<Recommendation, ManagerError> {
        validate_risk_tolerance(risk_tolerance)?;
        let key = recommendation_key(id, risk_tolerance, expand_universe);
        match self.cache.get::<Recommendation>(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
        }

        let mut portfolio = self.store.load_portfolio(id).await?;
        let holdings = portfolio.symbols();
        let held: HashSet<String> = holdings.iter().cloned().collect();
        let candidates = self.candidates(&portfolio, expand_universe);

        let batch = self
            .analysis
            .compute_analysis_profiles(&candidates, risk_tolerance, &held)
            .await?;
        mark_to_market(&mut portfolio, &batch);

        let plan = self.analysis.allocate(
            &batch,
            risk_tolerance,
            AllocationStrategy::ScoreProportional,
            &holdings,
        )?;
        let actions = self
            .analysis
            .generate_action_plan(&portfolio, &plan, &quotes_of(&batch))?;

        let recommendation = Recommendation {
            portfolio_id: id.to_string(),
            risk_tolerance,
            expand_universe,
            plan,
            actions,
            scores: batch.scores,
            failed_symbols: batch.failed_symbols,
            generated_at: self.clock.now(),
        };
        self.cache.set(&key, &recommendation).await?;
        info!(
            "Generated {} recommendations for {}",
            recommendation.actions.len(),
            id
        );
        Ok(recommendation)
    }

    /// # Summary
    /// 在后台生成推荐，结果落入缓存。
    pub fn spawn_recommendations(
        self: &Arc<Self>,
        id: &str,
        risk_tolerance: f64,
        expand_universe: bool,
    ) -> JoinHandle<Result<Recommendation, ManagerError>> {
        let manager = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move {
            manager
                .get_recommendations(&id, risk_tolerance, expand_universe)
                .await
        })
    }

    /// # Summary
    /// 应用 AI 推荐。
    ///
    /// # Logic
    /// 1. 取得 (缓存的) 推荐；组合级失败 (总市值为 0、无候选、约束不可行) 时
    ///    把状态记为 OPTIMIZATION_FAILED 后上报。
    /// 2. 状态迁移到 UPGRADED_WITH_AI，优化进行中时拒绝。
    /// 3. 把调仓指令应用到持仓，记录时间并持久化。
    /// 4. 失效该组合的全部推荐缓存。
    pub async fn apply_recommendations(
        &self,
        id: &str,
        risk_tolerance: f64,
        expand_universe: bool,
    ) -> Result<Portfolio, ManagerError> {
        let recommendation = match self
            .get_recommendations(id, risk_tolerance, expand_universe)
            .await
        {
            Ok(recommendation) => recommendation,
            Err(ManagerError::Analysis(e)) if !e.is_per_instrument() => {
                self.reject_apply(id, &e).await?;
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };
        let portfolio = self.store.load_portfolio(id).await?;
        if self.is_running(id) {
            return Err(ManagerError::AlreadyRunning(id.to_string()));
        }

        let mut upgraded = apply_action_plan(&portfolio, &recommendation.actions, self.clock.today());
        upgraded.apply_event(StatusEvent::ApplyAi)?;
        upgraded.last_optimized_at = Some(self.clock.now());
        self.store.save_portfolio(&upgraded).await?;
        self.invalidate(id).await?;
        info!(
            "Applied {} recommended actions to {}",
            recommendation.actions.len(),
            id
        );
        Ok(upgraded)
    }

    // 应用被组合级错误中止，状态记为失败；进行中的优化自行维护状态
    async fn reject_apply(&self, id: &str, cause: &AnalysisError) -> Result<(), ManagerError> {
        error!("Cannot apply recommendations to {}: {}", id, cause);
        if self.is_running(id) {
            return Ok(());
        }
        let mut portfolio = self.store.load_portfolio(id).await?;
        if let Err(e) = portfolio.apply_event(StatusEvent::Reject) {
            warn!("Leaving status of {} unchanged: {}", id, e);
            return Ok(());
        }
        self.store.save_portfolio(&portfolio).await?;
        Ok(())
    }

    /// # Summary
    /// 覆盖组合持仓，状态重置为 NOT_OPTIMIZED 并失效推荐缓存。
    /// 正在运行的优化会被中止，其结果不再有效。
    pub async fn update_holdings(
        &self,
        id: &str,
        holdings: Vec<Holding>,
    ) -> Result<Portfolio, ManagerError> {
        if self.abort_run(id) {
            warn!("Holdings of {} edited during optimization; aborting the run", id);
        }
        let mut portfolio = self.store.load_portfolio(id).await?;
        portfolio.holdings = holdings
            .into_iter()
            .map(|mut h| {
                h.symbol = normalize_symbol(&h.symbol);
                h
            })
            .filter(|h| h.shares > 0.0)
            .collect();
        portfolio.revalue();
        portfolio.risk_score = metrics::risk_score(&portfolio);
        portfolio.apply_event(StatusEvent::EditHoldings)?;
        self.store.save_portfolio(&portfolio).await?;
        self.invalidate(id).await?;
        Ok(portfolio)
    }
}
