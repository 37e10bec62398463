//! # `folio-cache` - 内存缓存适配器
//!
//! 为 `folio-core::cache::port::Cache` 提供基于 `DashMap` 的实现，
//! 用于记忆化推荐计算结果。

pub mod mem;
