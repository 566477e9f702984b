//! API 에러 응답 타입.
//!
//! 모든 엔드포인트가 같은 에러 형식을 사용합니다.
//!
//! ```json
//! {
//!   "code": "NOT_FOUND",
//!   "message": "찾을 수 없음: AAPL 데이터 없음",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::http::StatusCode;
use axum::Json;
use pulse_core::{ErrorKind, PulseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::ValidationErrors;

/// API 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_INPUT", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러 타입.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 에러 분류 → HTTP 상태 코드.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyInState => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Malformed => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage | ErrorKind::Config | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// 에러 분류 → 응답 코드 문자열.
pub fn code_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput => "INVALID_INPUT",
        ErrorKind::NotFound => "NOT_FOUND",
        ErrorKind::AlreadyInState => "ALREADY_IN_STATE",
        ErrorKind::Unavailable => "UNAVAILABLE",
        ErrorKind::Malformed => "UPSTREAM_MALFORMED",
        ErrorKind::Storage => "STORAGE_ERROR",
        ErrorKind::Config => "CONFIG_ERROR",
        ErrorKind::Internal => "INTERNAL_ERROR",
    }
}

/// 도메인 에러를 API 에러로 변환합니다.
///
/// 5xx 에러는 여기서 로그를 남깁니다.
pub fn api_error(err: impl Into<PulseError>) -> ApiError {
    let err = err.into();
    let kind = err.kind();
    let status = status_for(kind);

    if status.is_server_error() {
        tracing::error!(kind = %kind, error = %err, "요청 처리 실패");
    }

    (status, Json(ApiErrorResponse::new(code_for(kind), err.to_string())))
}

/// 코드와 메시지로 직접 API 에러를 생성합니다.
pub fn reject(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

/// validator 에러를 400 응답으로 변환합니다.
pub fn validation_error(errors: ValidationErrors) -> ApiError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    reject(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::AlreadyInState), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Unavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(ErrorKind::Malformed), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(ErrorKind::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_from_pulse_error() {
        let (status, Json(body)) = api_error(PulseError::NotFound("MSFT".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NOT_FOUND");
        assert!(body.message.contains("MSFT"));
        assert!(body.details.is_none());
    }

    #[test]
    fn test_details_serialization() {
        let err = ApiErrorResponse::with_details(
            "ALREADY_RUNNING",
            "이미 실행 중",
            serde_json::json!({"state": "running"}),
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "ALREADY_RUNNING");
        assert_eq!(json["details"]["state"], "running");
        assert!(json["timestamp"].is_i64());
    }
}
