//! # `folio-core` - 领域核心
//!
//! 组合分析与配置优化引擎的领域层，只包含实体、错误与端口 (Trait) 定义。
//!
//! ## 架构职责
//! - 定义行情、预测、指标、组合等领域实体
//! - 定义外部协作方的端口：历史行情、收益预测、指标与组合持久化、缓存
//! - 不包含任何 I/O 实现，具体适配器由 `folio-store`、`folio-cache`、`folio-forecast` 提供

pub mod analysis;
pub mod cache;
pub mod common;
pub mod config;
pub mod forecast;
pub mod indicator;
pub mod market;
pub mod portfolio;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testing;
