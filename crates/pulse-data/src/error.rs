//! 저장소 오류 타입.

use pulse_core::PulseError;
use thiserror::Error;

/// 저장소 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 데이터 삭제 오류
    #[error("Delete error: {0}")]
    DeleteError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::Duplicate(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DataError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DataError::MigrationError(err.to_string())
    }
}

impl From<DataError> for PulseError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => PulseError::NotFound(msg),
            DataError::InvalidData(msg) => PulseError::Malformed(msg),
            DataError::ConnectionError(_) | DataError::PoolExhausted => {
                PulseError::Unavailable(err.to_string())
            }
            other => PulseError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_error_mapping() {
        assert!(matches!(
            DataError::from(sqlx::Error::RowNotFound),
            DataError::NotFound(_)
        ));
        assert!(matches!(
            DataError::from(sqlx::Error::PoolTimedOut),
            DataError::PoolExhausted
        ));
    }

    #[test]
    fn test_into_pulse_error() {
        assert!(matches!(
            PulseError::from(DataError::PoolExhausted),
            PulseError::Unavailable(_)
        ));
        assert!(matches!(
            PulseError::from(DataError::InsertError("x".into())),
            PulseError::Storage(_)
        ));
        assert!(matches!(
            PulseError::from(DataError::NotFound("x".into())),
            PulseError::NotFound(_)
        ));
    }
}
