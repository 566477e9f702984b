//! 시뮬레이션 시세 소스.
//!
//! 시드 기반 랜덤 워크로 OHLCV를 생성합니다. 네트워크 없이 컬렉터를 실행하거나
//! 테스트에서 실패/지연을 주입하는 데 사용합니다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use pulse_core::{PriceObservation, Ticker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::source::QuoteSource;
use crate::QuoteError;

struct WalkState {
    rng: StdRng,
    prices: HashMap<Ticker, Decimal>,
    last_emitted: HashMap<Ticker, DateTime<Utc>>,
}

/// 시뮬레이션 시세 소스.
pub struct SimulatedQuoteSource {
    walk: Mutex<WalkState>,
    failures: Mutex<HashMap<Ticker, QuoteError>>,
    calls: Mutex<Vec<Ticker>>,
    latency: Duration,
}

impl SimulatedQuoteSource {
    pub fn new(seed: u64) -> Self {
        Self {
            walk: Mutex::new(WalkState {
                rng: StdRng::seed_from_u64(seed),
                prices: HashMap::new(),
                last_emitted: HashMap::new(),
            }),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// 호출마다 지연을 추가합니다.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 특정 심볼 조회가 항상 실패하도록 설정합니다.
    pub fn fail_symbol(&self, symbol: &Ticker, error: QuoteError) {
        lock(&self.failures).insert(symbol.clone(), error);
    }

    /// 주입한 실패를 제거합니다.
    pub fn clear_failure(&self, symbol: &Ticker) {
        lock(&self.failures).remove(symbol);
    }

    /// 지금까지 조회된 심볼 (호출 순서).
    pub fn calls(&self) -> Vec<Ticker> {
        lock(&self.calls).clone()
    }

    /// 특정 심볼의 조회 횟수.
    pub fn call_count(&self, symbol: &Ticker) -> usize {
        lock(&self.calls).iter().filter(|t| *t == symbol).count()
    }

    fn next_bar(&self, symbol: &Ticker) -> Result<PriceObservation, QuoteError> {
        let mut walk = lock(&self.walk);
        let WalkState {
            rng,
            prices,
            last_emitted,
        } = &mut *walk;

        let open = *prices
            .entry(symbol.clone())
            .or_insert_with(|| initial_price(symbol));

        let change = Decimal::from_f64_retain(rng.gen_range(-0.01..0.01)).unwrap_or_default();
        let close = (open * (Decimal::ONE + change)).round_dp(4);
        let spread = Decimal::from_f64_retain(rng.gen_range(0.0..0.005)).unwrap_or_default();
        let high = (open.max(close) * (Decimal::ONE + spread)).round_dp(4);
        let low = (open.min(close) * (Decimal::ONE - spread)).round_dp(4);
        let volume = Decimal::from(rng.gen_range(1_000u64..100_000));

        prices.insert(symbol.clone(), close);

        // 심볼별 관측 시각은 엄격히 증가
        let now = Utc::now()
            .duration_trunc(ChronoDuration::milliseconds(1))
            .unwrap_or_else(|_| Utc::now());
        let observed_at = match last_emitted.get(symbol) {
            Some(last) if now <= *last => *last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        last_emitted.insert(symbol.clone(), observed_at);

        PriceObservation::new(symbol.clone(), observed_at, open, high, low, close, volume)
            .map_err(QuoteError::from)
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch_latest(&self, symbol: &Ticker) -> Result<PriceObservation, QuoteError> {
        lock(&self.calls).push(symbol.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(err) = lock(&self.failures).get(symbol).cloned() {
            return Err(err);
        }

        self.next_bar(symbol)
    }
}

fn initial_price(symbol: &Ticker) -> Decimal {
    let seed: u32 = symbol.as_str().bytes().map(u32::from).sum();
    Decimal::from(50 + seed % 450)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_generates_consistent_bars() {
        let source = SimulatedQuoteSource::new(42);
        let aapl = ticker("AAPL");

        let mut previous: Option<PriceObservation> = None;
        for _ in 0..20 {
            let obs = source.fetch_latest(&aapl).await.unwrap();
            assert!(obs.high >= obs.low);
            assert!(obs.high >= obs.open && obs.high >= obs.close);
            assert!(obs.low <= obs.open && obs.low <= obs.close);
            if let Some(prev) = &previous {
                assert!(obs.observed_at > prev.observed_at);
                assert_eq!(obs.open, prev.close);
            }
            previous = Some(obs);
        }
        assert_eq!(source.call_count(&aapl), 20);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let source = SimulatedQuoteSource::new(1);
        let bad = ticker("ZZZZ");
        source.fail_symbol(&bad, QuoteError::NotFound("ZZZZ".into()));

        assert!(matches!(
            source.fetch_latest(&bad).await,
            Err(QuoteError::NotFound(_))
        ));
        assert!(source.fetch_latest(&ticker("MSFT")).await.is_ok());

        source.clear_failure(&bad);
        assert!(source.fetch_latest(&bad).await.is_ok());
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_same_seed_same_prices() {
        let a = SimulatedQuoteSource::new(9);
        let b = SimulatedQuoteSource::new(9);
        let t = ticker("TSLA");

        for _ in 0..5 {
            let x = a.fetch_latest(&t).await.unwrap();
            let y = b.fetch_latest(&t).await.unwrap();
            assert_eq!(x.close, y.close);
            assert_eq!(x.volume, y.volume);
        }
    }
}
