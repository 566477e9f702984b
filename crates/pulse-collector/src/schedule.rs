//! 틱 경계 계산.
//!
//! 다음 틱은 사이클 소요 시간이 아니라 이전 틱 시각에서 계산하므로 누적 지연이 없습니다.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// 이전 틱 이후 다음 틱 시각을 계산합니다.
///
/// 사이클이 하나 이상의 틱을 넘겨 실행되었다면 놓친 틱은 건너뛰고
/// 원래 위상을 유지한 채 `now` 이후의 첫 틱을 반환합니다.
pub fn next_tick(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let candidate = previous + interval;
    if candidate > now {
        return candidate;
    }

    let behind = now.duration_since(previous).as_nanos();
    let steps = behind / interval.as_nanos().max(1) + 1;
    u32::try_from(steps)
        .ok()
        .and_then(|steps| interval.checked_mul(steps))
        .map(|offset| previous + offset)
        .filter(|tick| *tick > now)
        .unwrap_or(now + interval)
}

/// 단조 시계 시각을 벽시계 시각으로 환산합니다 (상태 표시용).
pub fn wall_clock(at: Instant) -> DateTime<Utc> {
    let remaining = at.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_next_tick_on_time() {
        let t0 = Instant::now();
        // 사이클이 10초 걸려도 다음 틱은 t0 + 60초
        let now = t0 + Duration::from_secs(10);
        assert_eq!(next_tick(t0, MIN, now), t0 + MIN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_tick_skips_missed_ticks() {
        let t0 = Instant::now();
        // 150초 걸린 사이클: 60, 120 틱은 건너뛰고 180
        let now = t0 + Duration::from_secs(150);
        assert_eq!(next_tick(t0, MIN, now), t0 + Duration::from_secs(180));

        // 경계에 정확히 끝난 경우 같은 틱을 다시 쓰지 않음
        let now = t0 + Duration::from_secs(120);
        assert_eq!(next_tick(t0, MIN, now), t0 + Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_drift_over_many_ticks() {
        let t0 = Instant::now();
        let mut tick = t0;
        for _ in 0..1000 {
            let now = tick + Duration::from_millis(1_700);
            tick = next_tick(tick, Duration::from_secs(5), now);
        }
        assert_eq!(tick, t0 + Duration::from_secs(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_is_in_future() {
        let at = Instant::now() + MIN;
        let wall = wall_clock(at);
        let delta = wall - Utc::now();
        assert!(delta.num_seconds() >= 58 && delta.num_seconds() <= 60);
    }
}
