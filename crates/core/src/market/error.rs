use thiserror::Error;

/// # Summary
/// 行情数据域错误枚举，处理数据源不可用、解析失败及存储故障。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 空结果不是错误，由调用方按空序列处理。
#[derive(Error, Debug)]
pub enum MarketError {
    // 数据源不可达或拒绝服务
    #[error("Price source unavailable: {0}")]
    Unavailable(String),
    // 数据解析错误
    #[error("Parse error: {0}")]
    Parse(String),
    // 本地行情存储故障
    #[error("Storage error: {0}")]
    Storage(String),
    // 未知或未分类的错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}
