//! 수집 주기 검증.

use std::time::Duration;

use crate::error::{PulseError, PulseResult};

/// 에이전트가 받아들이는 최대 수집 주기 (7일).
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 수집 주기가 0보다 크고 [`MAX_INTERVAL`] 이하인지 확인합니다.
pub fn validate_interval(interval: Duration) -> PulseResult<Duration> {
    if interval.is_zero() {
        return Err(PulseError::InvalidInput(
            "수집 주기는 0보다 커야 합니다".to_string(),
        ));
    }
    if interval > MAX_INTERVAL {
        return Err(PulseError::InvalidInput(format!(
            "수집 주기는 {}초를 넘을 수 없습니다: {}초",
            MAX_INTERVAL.as_secs(),
            interval.as_secs()
        )));
    }
    Ok(interval)
}

/// 초 단위 주기를 허용 범위 안에서 검증합니다.
pub fn validate_interval_secs(secs: u64, min_secs: u64, max_secs: u64) -> PulseResult<Duration> {
    if secs < min_secs || secs > max_secs {
        return Err(PulseError::InvalidInput(format!(
            "수집 주기는 {}~{}초 사이여야 합니다: {}",
            min_secs, max_secs, secs
        )));
    }
    validate_interval(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_interval() {
        assert!(validate_interval(Duration::ZERO).is_err());
        assert_eq!(
            validate_interval(Duration::from_millis(5)).unwrap(),
            Duration::from_millis(5)
        );
        assert_eq!(validate_interval(MAX_INTERVAL).unwrap(), MAX_INTERVAL);
        assert!(validate_interval(MAX_INTERVAL + Duration::from_secs(1)).is_err());
        assert!(validate_interval(Duration::MAX).is_err());
    }

    #[test]
    fn test_validate_interval_secs_bounds() {
        assert!(validate_interval_secs(29, 30, 3600).is_err());
        assert!(validate_interval_secs(3601, 30, 3600).is_err());
        assert!(validate_interval_secs(0, 0, 3600).is_err());
        // 설정 상한이 커도 에이전트 상한은 넘을 수 없음
        assert!(validate_interval_secs(u64::MAX, 30, u64::MAX).is_err());
        assert_eq!(
            validate_interval_secs(60, 30, 3600).unwrap(),
            Duration::from_secs(60)
        );
    }
}
