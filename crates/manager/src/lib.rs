//! # `folio-manager` - 应用服务层
//!
//! 编译期仅依赖 `folio-core` 中的端口定义与 `folio-analytics` 的纯计算，
//! 所有适配器 (行情、预测、存储、缓存、时钟) 通过构造函数注入。

pub mod analysis;
pub mod error;
pub mod portfolio;
