use folio_core::analysis::error::AnalysisError;
use folio_core::cache::error::CacheError;
use folio_core::portfolio::error::StatusError;
use folio_core::store::error::StoreError;
use thiserror::Error;

/// # Summary
/// Manager 层的统一错误类型。
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Status error: {0}")]
    Status(#[from] StatusError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Optimization already running: {0}")]
    AlreadyRunning(String),
    #[error("Risk tolerance must be within [0, 1], got {0}")]
    InvalidRiskTolerance(f64),
}
