use crate::portfolio::entity::{OptimizationStatus, StatusEvent};
use thiserror::Error;

/// # Summary
/// 组合状态机错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    // 已有优化任务在运行
    #[error("Optimization already in progress")]
    AlreadyOptimizing,
    // 非法迁移
    #[error("Invalid status transition from {from} on {event:?}")]
    InvalidTransition {
        from: OptimizationStatus,
        event: StatusEvent,
    },
}
