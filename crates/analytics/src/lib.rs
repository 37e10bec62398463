//! # `folio-analytics` - 分析与优化计算内核
//!
//! 所有函数都是对不可变序列的纯计算，不做任何 I/O。
//!
//! ## 流水线
//! 行情 → [`indicator`] + [`risk`] → [`profile`] → [`scorer`] → [`optimizer`] → [`action`]
//!
//! 样本数与索引之间的 `usize` → `f64` 转换在数值计算中无处不在，本 crate 统一放行相关 lint。
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod action;
pub mod indicator;
pub mod metrics;
pub mod optimizer;
pub mod profile;
pub mod risk;
pub mod scorer;
