//! Prometheus 메트릭 설정 및 HTTP 메트릭 헬퍼.
//!
//! 컬렉터 메트릭(`collector_*`)과 HTTP 메트릭을 같은 레코더로 수집해 `/metrics`로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 핸들을 반환합니다.
///
/// 레코더는 프로세스당 한 번만 설치할 수 있습니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("collector_cycle_duration_seconds".to_string()),
            &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        )?
        .install_recorder()
}

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// 경로의 종목 파라미터를 정규화합니다 (라벨 카디널리티 제한).
///
/// 예: `/api/v1/prices/history/AAPL` → `/api/v1/prices/history/:symbol`
pub fn normalize_path(path: &str) -> String {
    const SYMBOL_ROUTES: [&str; 3] = ["history", "summary", "data"];

    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let after_symbol_route = i > 0
                && SYMBOL_ROUTES.contains(&segments[i - 1])
                && segments.get(i.saturating_sub(2)) == Some(&"prices");
            if after_symbol_route && !segment.is_empty() {
                ":symbol"
            } else {
                *segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
