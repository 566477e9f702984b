//! Yahoo Finance 시세 소스.
//!
//! 당일(1d) 범위의 1분봉을 조회하고 마지막 봉을 최신 관측치로 사용합니다.
//! 관측 시각은 봉의 시작 시각이므로 같은 분 안의 반복 조회는 하나의 레코드로 합쳐집니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pulse_core::{PriceObservation, Ticker};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::source::QuoteSource;
use crate::QuoteError;

const BAR_INTERVAL: &str = "1m";
const BAR_RANGE: &str = "1d";

/// Yahoo Finance 시세 소스.
pub struct YahooQuoteSource {
    connector: yahoo::YahooConnector,
    timeout: Duration,
}

impl YahooQuoteSource {
    /// 새로운 Yahoo Finance 소스 생성.
    pub fn new(timeout: Duration) -> Result<Self, QuoteError> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| QuoteError::Unavailable(format!("Yahoo Finance 연결 실패: {}", e)))?;

        Ok(Self { connector, timeout })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_latest(&self, symbol: &Ticker) -> Result<PriceObservation, QuoteError> {
        let request = self
            .connector
            .get_quote_range(symbol.as_str(), BAR_INTERVAL, BAR_RANGE);

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| QuoteError::Timeout(format!("{} ({}ms)", symbol, self.timeout.as_millis())))?
            .map_err(|e| classify_error(symbol, &e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| classify_error(symbol, &e.to_string()))?;

        let Some(quote) = quotes.last() else {
            warn!(symbol = %symbol, "Yahoo Finance 데이터 없음");
            return Err(QuoteError::NotFound(format!("{}: 데이터 없음", symbol)));
        };

        debug!(symbol = %symbol, bars = quotes.len(), "Yahoo Finance 1분봉 수신");

        observation_from_bar(
            symbol,
            quote.timestamp as i64,
            [quote.open, quote.high, quote.low, quote.close],
            quote.volume as u64,
        )
    }
}

/// Yahoo 봉 데이터를 관측치로 변환합니다.
///
/// `ohlc`는 [시가, 고가, 저가, 종가] 순서입니다.
pub(crate) fn observation_from_bar(
    symbol: &Ticker,
    timestamp: i64,
    ohlc: [f64; 4],
    volume: u64,
) -> Result<PriceObservation, QuoteError> {
    let observed_at = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| QuoteError::Malformed(format!("{}: 잘못된 타임스탬프 {}", symbol, timestamp)))?;

    let [open, high, low, close] = ohlc;
    PriceObservation::new(
        symbol.clone(),
        observed_at,
        to_decimal(symbol, "open", open)?,
        to_decimal(symbol, "high", high)?,
        to_decimal(symbol, "low", low)?,
        to_decimal(symbol, "close", close)?,
        Decimal::from(volume),
    )
    .map_err(QuoteError::from)
}

fn to_decimal(symbol: &Ticker, field: &str, value: f64) -> Result<Decimal, QuoteError> {
    if !value.is_finite() {
        return Err(QuoteError::Malformed(format!(
            "{}: {} 값이 유효하지 않습니다 ({})",
            symbol, field, value
        )));
    }
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| QuoteError::Malformed(format!("{}: {} 변환 실패", symbol, field)))
}

/// Yahoo 에러 메시지를 분류합니다.
pub(crate) fn classify_error(symbol: &Ticker, message: &str) -> QuoteError {
    let lower = message.to_lowercase();
    let detail = format!("{}: {}", symbol, message);

    if lower.contains("429") || lower.contains("too many") {
        QuoteError::RateLimited(detail)
    } else if ["not found", "no data", "no quotes", "no result", "delisted", "404", "empty"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        QuoteError::NotFound(detail)
    } else if ["deserializ", "json", "parse", "invalid", "inconsisten"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        QuoteError::Malformed(detail)
    } else {
        QuoteError::Unavailable(detail)
    }
}
