//! # `folio-forecast` - 参考预测适配器
//!
//! 核心层把预测器视为黑盒，只依赖 [`ForecastProvider`](folio_core::forecast::port::ForecastProvider)。
//! 这里提供一个可离线运行的实现：对最近一段收盘价做最小二乘线性回归并外推。
#![allow(clippy::cast_precision_loss)]

pub mod trend;
