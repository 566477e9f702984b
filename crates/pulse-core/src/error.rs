//! 시세 수집 시스템의 에러 타입.
//!
//! 컬렉터, 시세 소스, 저장소가 공유하는 에러 분류 체계를 정의합니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 에러 분류.
///
/// 통계와 실패 요약에 기록되는 직렬화 가능한 판별자입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unavailable,
    Malformed,
    AlreadyInState,
    Storage,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::Malformed => "malformed",
            Self::AlreadyInState => "already_in_state",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum PulseError {
    /// 잘못된 호출 인자 (빈 티커 목록, 0 이하의 주기 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 알 수 없는 심볼 또는 저장소에 없는 데이터
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 업스트림/저장소 일시 불가
    #[error("사용 불가: {0}")]
    Unavailable(String),

    /// 해석할 수 없는 업스트림 응답
    #[error("잘못된 응답: {0}")]
    Malformed(String),

    /// 중복된 시작/중지 요청
    #[error("이미 해당 상태: {0}")]
    AlreadyInState(String),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 시세 수집 작업을 위한 Result 타입.
pub type PulseResult<T> = Result<T, PulseError>;

impl PulseError {
    /// 에러 분류를 반환합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::AlreadyInState(_) => ErrorKind::AlreadyInState,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PulseError::Unavailable(_) | PulseError::Storage(_))
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        PulseError::Malformed(err.to_string())
    }
}

impl From<config::ConfigError> for PulseError {
    fn from(err: config::ConfigError) -> Self {
        PulseError::Config(err.to_string())
    }
}
