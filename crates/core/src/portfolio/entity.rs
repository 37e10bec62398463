use crate::portfolio::error::StatusError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// # Summary
/// 组合优化生命周期状态。
///
/// # Invariants
/// - 合法迁移：`NotOptimized → Optimizing → {Optimized, OptimizationFailed}`；
///   应用 AI 推荐迁移到 `UpgradedWithAi`；任何持仓编辑都回到 `NotOptimized`。
/// - `Optimizing` 期间不得再次启动优化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStatus {
    NotOptimized,
    Optimizing,
    Optimized,
    OptimizationFailed,
    UpgradedWithAi,
}

/// # Summary
/// 驱动状态机迁移的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    // 开始一次优化
    Start,
    // 优化成功完成
    Complete,
    // 优化失败
    Fail,
    // 应用 AI 推荐
    ApplyAi,
    // 持仓被编辑
    EditHoldings,
    // 组合级失败 (例如总市值为 0) 使一次配置应用中止
    Reject,
}

impl OptimizationStatus {
    /// # Summary
    /// 根据事件计算下一个状态。
    ///
    /// # Logic
    /// 1. `Start` 在 `Optimizing` 时被拒绝，其余状态均可开始。
    /// 2. `Complete` / `Fail` 只接受 `Optimizing`。
    /// 3. `ApplyAi` 不能打断进行中的优化。
    /// 4. `EditHoldings` 在任何状态下都回到 `NotOptimized`。
/// 5. `Reject` 把非优化中的组合记为 `OptimizationFailed`。
    ///
    /// # Arguments
    /// * `event`: 触发事件。
    ///
    /// # Returns
    /// 成功返回新状态，非法迁移返回 `StatusError`。
    pub fn transition(self, event: StatusEvent) -> Result<Self, StatusError> {
        use OptimizationStatus::*;
        match (self, event) {
            (Optimizing, StatusEvent::Start) => Err(StatusError::AlreadyOptimizing),
            (_, StatusEvent::Start) => Ok(Optimizing),
            (Optimizing, StatusEvent::Complete) => Ok(Optimized),
            (Optimizing, StatusEvent::Fail) => Ok(OptimizationFailed),
            (Optimizing, StatusEvent::ApplyAi) => Err(StatusError::AlreadyOptimizing),
            (_, StatusEvent::ApplyAi) => Ok(UpgradedWithAi),
            (_, StatusEvent::EditHoldings) => Ok(NotOptimized),
            (Optimizing, StatusEvent::Reject) => Err(StatusError::AlreadyOptimizing),
            (_, StatusEvent::Reject) => Ok(OptimizationFailed),
            (from, event) => Err(StatusError::InvalidTransition { from, event }),
        }
    }

    /// 是否有优化任务正在进行。
    pub fn is_optimizing(self) -> bool {
        self == OptimizationStatus::Optimizing
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptimizationStatus::NotOptimized => "NOT_OPTIMIZED",
            OptimizationStatus::Optimizing => "OPTIMIZING",
            OptimizationStatus::Optimized => "OPTIMIZED",
            OptimizationStatus::OptimizationFailed => "OPTIMIZATION_FAILED",
            OptimizationStatus::UpgradedWithAi => "UPGRADED_WITH_AI",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OptimizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_OPTIMIZED" => Ok(OptimizationStatus::NotOptimized),
            "OPTIMIZING" => Ok(OptimizationStatus::Optimizing),
            "OPTIMIZED" => Ok(OptimizationStatus::Optimized),
            "OPTIMIZATION_FAILED" => Ok(OptimizationStatus::OptimizationFailed),
            "UPGRADED_WITH_AI" => Ok(OptimizationStatus::UpgradedWithAi),
            _ => Err(format!("Unknown OptimizationStatus: {}", s)),
        }
    }
}

/// # Summary
/// 组合内单个标的的持仓。
///
/// # Invariants
/// - `weight` 永远由所属组合重新计算 (市值 / 组合总市值)，不独立保存。
/// - `return_value` 与 `return_percentage` 由持仓数量、成本与现价派生。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    // 持仓成本价
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub current_price: f64,
    pub weight: f64,
    // 浮动盈亏金额
    pub return_value: f64,
    // 浮动盈亏百分比
    pub return_percentage: f64,
}

impl Holding {
    /// # Summary
    /// 创建一笔持仓并计算其盈亏字段，权重在加入组合后由 `Portfolio::revalue` 填充。
    pub fn new(
        symbol: &str,
        shares: f64,
        entry_price: f64,
        entry_date: NaiveDate,
        current_price: f64,
    ) -> Self {
        let mut holding = Self {
            symbol: symbol.to_string(),
            shares,
            entry_price,
            entry_date,
            current_price,
            weight: 0.0,
            return_value: 0.0,
            return_percentage: 0.0,
        };
        holding.refresh_returns();
        holding
    }

    /// 当前市值。
    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    fn refresh_returns(&mut self) {
        self.return_value = (self.current_price - self.entry_price) * self.shares;
        self.return_percentage = if self.entry_price > 0.0 {
            (self.current_price - self.entry_price) / self.entry_price * 100.0
        } else {
            0.0
        };
    }
}

/// # Summary
/// 投资组合聚合根。
///
/// # Invariants
/// - `total_value`、`total_return` 与各持仓 `weight` 始终由持仓重新推导。
/// - `risk_score` ∈ [0, 100]。
/// - 仅由优化/推荐应用路径修改持仓；身份与归属由外部持久层管理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub owner: String,
    pub holdings: Vec<Holding>,
    pub total_value: f64,
    pub total_return: f64,
    pub risk_score: f64,
    pub optimization_status: OptimizationStatus,
    pub last_optimized_at: Option<DateTime<Utc>>,
}

impl Portfolio {
    /// 创建一个空组合。
    pub fn new(id: &str, owner: &str) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            holdings: Vec::new(),
            total_value: 0.0,
            total_return: 0.0,
            risk_score: 0.0,
            optimization_status: OptimizationStatus::NotOptimized,
            last_optimized_at: None,
        }
    }

    /// # Summary
    /// 以新的持仓列表构建组合并完成一次重估。
    pub fn with_holdings(id: &str, owner: &str, holdings: Vec<Holding>) -> Self {
        let mut portfolio = Self::new(id, owner);
        portfolio.holdings = holdings;
        portfolio.revalue();
        portfolio
    }

    /// # Summary
    /// 按当前价格重估组合。
    ///
    /// # Logic
    /// 1. 刷新每笔持仓的盈亏。
    /// 2. 汇总总市值与总盈亏。
    /// 3. 以 市值 / 总市值 重算权重，总市值为 0 时权重全部为 0。
    pub fn revalue(&mut self) {
        for holding in &mut self.holdings {
            holding.refresh_returns();
        }
        self.total_value = self.holdings.iter().map(Holding::market_value).sum();
        self.total_return = self.holdings.iter().map(|h| h.return_value).sum();
        let total = self.total_value;
        for holding in &mut self.holdings {
            holding.weight = if total > 0.0 {
                holding.market_value() / total
            } else {
                0.0
            };
        }
    }

    /// 按代码查找持仓。
    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    /// 当前持有的全部证券代码，保持持仓顺序。
    pub fn symbols(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.symbol.clone()).collect()
    }

    /// # Summary
    /// 对状态机施加一个事件并原地更新状态。
    pub fn apply_event(&mut self, event: StatusEvent) -> Result<OptimizationStatus, StatusError> {
        let next = self.optimization_status.transition(event)?;
        self.optimization_status = next;
        Ok(next)
    }
}

/// # Summary
/// 调仓动作类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Buy => write!(f, "BUY"),
            ActionKind::Sell => write!(f, "SELL"),
            ActionKind::Hold => write!(f, "HOLD"),
        }
    }
}

/// # Summary
/// 单个标的的调仓指令。
///
/// # Invariants
/// - `target_shares` 为整数股。
/// - `reason` 由目标权重与当前持仓推导生成，不是模型自由文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAction {
    pub symbol: String,
    pub action: ActionKind,
    pub current_shares: f64,
    pub target_shares: f64,
    pub current_price: f64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn test_status_lifecycle() {
        let s = OptimizationStatus::NotOptimized;
        let s = s.transition(StatusEvent::Start).unwrap();
        assert_eq!(s, OptimizationStatus::Optimizing);
        assert!(s.transition(StatusEvent::Start).is_err());
        assert_eq!(
            s.transition(StatusEvent::Complete).unwrap(),
            OptimizationStatus::Optimized
        );
        assert_eq!(
            s.transition(StatusEvent::Fail).unwrap(),
            OptimizationStatus::OptimizationFailed
        );
    }

    #[test]
    fn test_status_rejects_completion_without_run() {
        assert!(
            OptimizationStatus::NotOptimized
                .transition(StatusEvent::Complete)
                .is_err()
        );
        assert!(
            OptimizationStatus::Optimized
                .transition(StatusEvent::Fail)
                .is_err()
        );
    }

    #[test]
    fn test_edit_resets_status() {
        for s in [
            OptimizationStatus::Optimized,
            OptimizationStatus::OptimizationFailed,
            OptimizationStatus::UpgradedWithAi,
            OptimizationStatus::Optimizing,
        ] {
            assert_eq!(
                s.transition(StatusEvent::EditHoldings).unwrap(),
                OptimizationStatus::NotOptimized
            );
        }
        assert_eq!(
            OptimizationStatus::Optimized
                .transition(StatusEvent::ApplyAi)
                .unwrap(),
            OptimizationStatus::UpgradedWithAi
        );
    }

    #[test]
    fn test_reject_marks_failure_outside_a_run() {
        for s in [
            OptimizationStatus::NotOptimized,
            OptimizationStatus::Optimized,
            OptimizationStatus::UpgradedWithAi,
        ] {
            assert_eq!(
                s.transition(StatusEvent::Reject).unwrap(),
                OptimizationStatus::OptimizationFailed
            );
        }
        assert!(
            OptimizationStatus::Optimizing
                .transition(StatusEvent::Reject)
                .is_err()
        );
    }

    #[test]
    fn test_status_string_roundtrip() {
        let s: OptimizationStatus = "UPGRADED_WITH_AI".parse().unwrap();
        assert_eq!(s.to_string(), "UPGRADED_WITH_AI");
        assert!("optimized".parse::<OptimizationStatus>().is_err());
    }

    #[test]
    fn test_revalue_weights() {
        let p = Portfolio::with_holdings(
            "p1",
            "u1",
            vec![
                Holding::new("AAPL", 100.0, 140.0, day(), 150.0),
                Holding::new("MSFT", 50.0, 300.0, day(), 300.0),
            ],
        );
        assert_eq!(p.total_value, 30000.0);
        assert_eq!(p.total_return, 1000.0);
        let w: f64 = p.holdings.iter().map(|h| h.weight).sum();
        assert!((w - 1.0).abs() < 1e-12);
        assert!((p.holding("AAPL").unwrap().weight - 0.5).abs() < 1e-12);
    }
}
