//! # `folio-store` - 持久化适配器
//!
//! - [`market::SqlitePriceStore`]：日线行情，一库一股，同时作为 `PriceHistoryProvider`。
//! - [`indicator::SqliteIndicatorStore`]：技术指标，一库一股，区间整体替换。
//! - [`portfolio::SqlitePortfolioStore`]：组合与持仓，集中存放于 `portfolio.db`。
//! - [`memory::MemoryPortfolioStore`]：进程内组合仓储，供测试与无盘运行使用。

pub mod config;
pub mod indicator;
pub mod market;
pub mod memory;
pub mod portfolio;
