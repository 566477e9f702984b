//! 컬렉터 메트릭.
//!
//! 레코더가 설치되지 않은 경우(독립 실행, 테스트) 기록은 무시됩니다.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::stats::CycleReport;

/// 사이클 완료 메트릭 기록.
pub fn record_cycle(report: &CycleReport, elapsed: Duration) {
    let trigger = report.trigger.to_string();

    counter!("collector_cycles_total", "trigger" => trigger.clone()).increment(1);
    counter!("collector_symbol_successes_total", "trigger" => trigger.clone())
        .increment(report.successful_count());
    counter!("collector_symbol_failures_total", "trigger" => trigger.clone())
        .increment(report.failed_count());
    histogram!("collector_cycle_duration_seconds", "trigger" => trigger)
        .record(elapsed.as_secs_f64());
}

/// 수집 중 여부 설정.
pub fn set_running(running: bool) {
    gauge!("collector_running").set(if running { 1.0 } else { 0.0 });
}

/// 활성 티커 수 설정.
pub fn set_active_tickers(count: usize) {
    gauge!("collector_active_tickers").set(count as f64);
}
