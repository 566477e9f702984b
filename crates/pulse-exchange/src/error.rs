//! 시세 소스 에러 타입.

use pulse_core::{ErrorKind, PulseError};
use thiserror::Error;

/// 시세 조회 에러.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    /// 알 수 없는 심볼 또는 데이터 없음
    #[error("Symbol not found: {0}")]
    NotFound(String),

    /// 업스트림 연결 실패
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 해석할 수 없는 응답
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl QuoteError {
    /// 에러 분류. 한도 초과와 타임아웃은 `Unavailable`로 취급합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuoteError::NotFound(_) => ErrorKind::NotFound,
            QuoteError::Unavailable(_) | QuoteError::RateLimited(_) | QuoteError::Timeout(_) => {
                ErrorKind::Unavailable
            }
            QuoteError::Malformed(_) => ErrorKind::Malformed,
        }
    }

    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

impl From<QuoteError> for PulseError {
    fn from(err: QuoteError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => PulseError::NotFound(err.to_string()),
            ErrorKind::Malformed => PulseError::Malformed(err.to_string()),
            _ => PulseError::Unavailable(err.to_string()),
        }
    }
}

impl From<PulseError> for QuoteError {
    fn from(err: PulseError) -> Self {
        match err {
            PulseError::NotFound(msg) => QuoteError::NotFound(msg),
            PulseError::Malformed(msg) | PulseError::InvalidInput(msg) => {
                QuoteError::Malformed(msg)
            }
            other => QuoteError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(QuoteError::Timeout("AAPL".into()).kind(), ErrorKind::Unavailable);
        assert_eq!(QuoteError::RateLimited("429".into()).kind(), ErrorKind::Unavailable);
        assert_eq!(QuoteError::NotFound("ZZZZ".into()).kind(), ErrorKind::NotFound);
        assert!(QuoteError::Unavailable("down".into()).is_retryable());
        assert!(!QuoteError::Malformed("nan".into()).is_retryable());
    }

    #[test]
    fn test_into_pulse_error() {
        let err: PulseError = QuoteError::Timeout("AAPL".into()).into();
        assert!(matches!(err, PulseError::Unavailable(_)));

        let err: PulseError = QuoteError::NotFound("ZZZZ".into()).into();
        assert!(matches!(err, PulseError::NotFound(_)));
    }
}
