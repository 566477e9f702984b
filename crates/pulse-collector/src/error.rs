//! 에러 타입 정의.

use pulse_core::PulseError;
use pulse_data::DataError;
use pulse_exchange::QuoteError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 잘못된 제어 요청 (빈 티커 목록, 0 이하 주기)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 저장소 에러
    #[error("Store error: {0}")]
    Store(#[from] DataError),

    /// 시세 소스 에러
    #[error("Quote source error: {0}")]
    Source(#[from] QuoteError),
}

impl From<PulseError> for CollectorError {
    fn from(err: PulseError) -> Self {
        match err {
            PulseError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<CollectorError> for PulseError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::InvalidInput(msg) => PulseError::InvalidInput(msg),
            CollectorError::Config(msg) => PulseError::Config(msg),
            CollectorError::Store(e) => e.into(),
            CollectorError::Source(e) => e.into(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
