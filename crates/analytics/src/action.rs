use crate::metrics;
use chrono::NaiveDate;
use folio_core::analysis::entity::AllocationPlan;
use folio_core::analysis::error::AnalysisError;
use folio_core::portfolio::entity::{ActionKind, Holding, Portfolio, StockAction};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// 调仓迟滞区间：目标股数在当前股数 ±10% 内一律持有
pub const HYSTERESIS_BAND: f64 = 0.10;

/// # Summary
/// 按迟滞区间对当前股数与目标股数分类。
pub fn classify(current_shares: f64, target_shares: f64) -> ActionKind {
    if target_shares > current_shares * (1.0 + HYSTERESIS_BAND) {
        ActionKind::Buy
    } else if target_shares < current_shares * (1.0 - HYSTERESIS_BAND) {
        ActionKind::Sell
    } else {
        ActionKind::Hold
    }
}

/// # Summary
/// 目标股数 `floor(totalValue · targetWeight / price)`，价格非正时为 0。
pub fn target_shares(total_value: f64, target_weight: f64, price: f64) -> f64 {
    if price <= 0.0 || !price.is_finite() {
        return 0.0;
    }
    (total_value * target_weight / price).floor().max(0.0)
}

/// # Summary
/// 对比当前持仓与目标权重，生成调仓指令。
///
/// # Logic
/// 1. 组合总市值非正时拒绝生成 (`AnalysisError::PortfolioState`)。
/// 2. 已持有标的：按最新报价 (缺失时用持仓现价) 计算目标股数并按迟滞区间分类；不在目标中的清仓卖出。
/// 3. 新标的：从 0 股买入；无报价或目标股数为 0 的跳过。
/// 4. 排序：BUY/SELL 在 HOLD 之前，其后按目标股数降序，再按代码升序。
///
/// # Arguments
/// * `portfolio`: 当前组合 (需已重估)。
/// * `plan`: 目标配置方案。
/// * `quotes`: 代码到最新价格的映射。
///
/// # Returns
/// 调仓指令列表。
pub fn generate_action_plan(
    portfolio: &Portfolio,
    plan: &AllocationPlan,
    quotes: &HashMap<String, f64>,
) -> Result<Vec<StockAction>, AnalysisError> {
    let total_value = portfolio.total_value;
    if total_value <= 0.0 || !total_value.is_finite() {
        return Err(AnalysisError::PortfolioState(format!(
            "portfolio {} has non-positive total value {:.2}",
            portfolio.id, total_value
        )));
    }

    let mut actions = Vec::new();
    for holding in &portfolio.holdings {
        let price = quotes
            .get(&holding.symbol)
            .copied()
            .filter(|p| *p > 0.0)
            .unwrap_or(holding.current_price);
        let current_weight = holding.market_value() / total_value;
        let (action, target, target_weight) = match plan.weights.get(&holding.symbol) {
            Some(weight) => {
                let target = target_shares(total_value, *weight, price);
                (classify(holding.shares, target), target, *weight)
            }
            None => (ActionKind::Sell, 0.0, 0.0),
        };
        actions.push(StockAction {
            symbol: holding.symbol.clone(),
            action,
            current_shares: holding.shares,
            target_shares: target,
            current_price: price,
            reason: describe(action, holding.shares, target, current_weight, target_weight),
        });
    }

    let held: BTreeSet<&str> = portfolio.holdings.iter().map(|h| h.symbol.as_str()).collect();
    for (symbol, weight) in &plan.weights {
        if held.contains(symbol.as_str()) {
            continue;
        }
        let Some(price) = quotes.get(symbol).copied().filter(|p| *p > 0.0) else {
            warn!("No quote for new position {}; skipping", symbol);
            continue;
        };
        let target = target_shares(total_value, *weight, price);
        if target <= 0.0 {
            debug!(
                "Target weight {:.4} of {} buys no whole share at {:.2}",
                weight, symbol, price
            );
            continue;
        }
        actions.push(StockAction {
            symbol: symbol.clone(),
            action: ActionKind::Buy,
            current_shares: 0.0,
            target_shares: target,
            current_price: price,
            reason: describe(ActionKind::Buy, 0.0, target, 0.0, *weight),
        });
    }

    actions.sort_by(compare_actions);
    Ok(actions)
}

fn compare_actions(a: &StockAction, b: &StockAction) -> Ordering {
    let rank = |kind: ActionKind| u8::from(kind == ActionKind::Hold);
    rank(a.action)
        .cmp(&rank(b.action))
        .then_with(|| b.target_shares.total_cmp(&a.target_shares))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

fn describe(
    action: ActionKind,
    current_shares: f64,
    target_shares: f64,
    current_weight: f64,
    target_weight: f64,
) -> String {
    let weights = format!(
        "target weight {:.1}% vs current {:.1}%",
        target_weight * 100.0,
        current_weight * 100.0
    );
    match action {
        ActionKind::Buy if current_shares <= 0.0 => {
            format!("Open new position of {target_shares:.0} shares: {weights}")
        }
        ActionKind::Buy => format!(
            "Increase from {current_shares:.0} to {target_shares:.0} shares: {weights}"
        ),
        ActionKind::Sell if target_shares <= 0.0 => {
            format!("Close position of {current_shares:.0} shares: {weights}")
        }
        ActionKind::Sell => format!(
            "Reduce from {current_shares:.0} to {target_shares:.0} shares: {weights}"
        ),
        ActionKind::Hold => format!(
            "Keep {current_shares:.0} shares, target {target_shares:.0} is within the 10% band: {weights}"
        ),
    }
}

/// # Summary
/// 把调仓指令应用到组合上，返回新的组合。
///
/// # Logic
/// 1. HOLD 保持原股数只更新现价；BUY/SELL 把目标股数写入持仓并更新现价。
/// 2. 加仓按股数加权平均入场价；新开仓以现价为入场价、`today` 为入场日期。
/// 3. 股数为 0 的持仓移除。
/// 4. 重估组合并刷新风险评分。状态与 `last_optimized_at` 由调用方维护。
pub fn apply_action_plan(portfolio: &Portfolio, actions: &[StockAction], today: NaiveDate) -> Portfolio {
    let mut next = portfolio.clone();
    for action in actions {
        let price = action.current_price;
        let target = action.target_shares.max(0.0);
        match next.holdings.iter_mut().find(|h| h.symbol == action.symbol) {
            Some(holding) if action.action == ActionKind::Hold => {
                holding.current_price = price;
            }
            None if action.action == ActionKind::Hold => {}
            Some(holding) => {
                if target > holding.shares && target > 0.0 {
                    let added = target - holding.shares;
                    holding.entry_price =
                        (holding.shares * holding.entry_price + added * price) / target;
                }
                holding.shares = target;
                holding.current_price = price;
            }
            None if target > 0.0 => {
                next.holdings
                    .push(Holding::new(&action.symbol, target, price, today, price));
            }
            None => {}
        }
    }
    next.holdings.retain(|h| h.shares > 0.0);
    next.revalue();
    next.risk_score = metrics::risk_score(&next);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_band_edges() {
        assert_eq!(classify(100.0, 110.0), ActionKind::Hold);
        assert_eq!(classify(100.0, 111.0), ActionKind::Buy);
        assert_eq!(classify(100.0, 90.0), ActionKind::Hold);
        assert_eq!(classify(100.0, 89.0), ActionKind::Sell);
        assert_eq!(classify(0.0, 1.0), ActionKind::Buy);
    }

    #[test]
    fn test_target_shares_floors() {
        assert_eq!(target_shares(30000.0, 0.252, 300.0), 25.0);
        assert_eq!(target_shares(1000.0, 0.5, 0.0), 0.0);
    }
}
