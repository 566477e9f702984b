//! 시세 소스 인터페이스.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{PriceObservation, QuoteSourceConfig, QuoteSourceKind, Ticker};
use tracing::info;

use crate::{QuoteError, SimulatedQuoteSource, YahooQuoteSource};

/// 종목별 최신 시세를 조회하는 소스.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 소스 이름 (로그용).
    fn name(&self) -> &str;

    /// 최신 관측치를 조회합니다.
    ///
    /// # 에러
    /// * `NotFound` - 알 수 없는 심볼
    /// * `Unavailable` / `RateLimited` / `Timeout` - 업스트림 일시 불가
    /// * `Malformed` - 해석할 수 없는 응답
    async fn fetch_latest(&self, symbol: &Ticker) -> Result<PriceObservation, QuoteError>;
}

/// 호출당 타임아웃을 적용하여 조회합니다.
pub async fn fetch_with_timeout(
    source: &dyn QuoteSource,
    symbol: &Ticker,
    timeout: Duration,
) -> Result<PriceObservation, QuoteError> {
    match tokio::time::timeout(timeout, source.fetch_latest(symbol)).await {
        Ok(result) => result,
        Err(_) => Err(QuoteError::Timeout(format!(
            "{} ({}ms 초과)",
            symbol,
            timeout.as_millis()
        ))),
    }
}

/// 설정에 따라 시세 소스를 생성합니다.
pub fn build_source(
    config: &QuoteSourceConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn QuoteSource>, QuoteError> {
    let source: Arc<dyn QuoteSource> = match config.kind {
        QuoteSourceKind::Yahoo => Arc::new(YahooQuoteSource::new(request_timeout)?),
        QuoteSourceKind::Simulated => Arc::new(
            SimulatedQuoteSource::new(config.seed)
                .with_latency(Duration::from_millis(config.latency_ms)),
        ),
    };
    info!(source = source.name(), "시세 소스 초기화");
    Ok(source)
}
