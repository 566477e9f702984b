//! 인메모리 저장소.
//!
//! 종목별 `BTreeMap<observed_at, PriceObservation>`으로 시간 순서를 유지합니다.
//! DB 없이 실행할 때와 테스트에서 사용합니다.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pulse_core::{
    LatestPrice, PriceObservation, PriceSummary, Ticker, TickerInfo, TickerSet, TimeRange,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{AppendOutcome, PriceStore};
use crate::Result;

type Series = BTreeMap<DateTime<Utc>, PriceObservation>;

#[derive(Default)]
struct Inner {
    series: HashMap<Ticker, Series>,
    /// 티커 → 활성 여부
    registry: BTreeMap<Ticker, bool>,
}

/// 인메모리 시세 저장소.
#[derive(Default)]
pub struct MemoryPriceStore {
    inner: RwLock<Inner>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 전체 레코드 수.
    pub async fn len(&self) -> usize {
        self.inner.read().await.series.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn latest_with_change(series: &Series, since: DateTime<Utc>) -> Option<LatestPrice> {
    let (_, latest) = series.last_key_value()?;
    let reference = series.range(since..).next().map(|(_, obs)| obs);
    Some(LatestPrice::new(latest.clone(), reference))
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, observation: &PriceObservation) -> Result<AppendOutcome> {
        let mut inner = self.inner.write().await;
        let previous = inner
            .series
            .entry(observation.symbol.clone())
            .or_default()
            .insert(observation.observed_at, observation.clone());
        inner.registry.insert(observation.symbol.clone(), true);

        Ok(match previous {
            Some(_) => AppendOutcome::Replaced,
            None => AppendOutcome::Inserted,
        })
    }

    async fn latest_for(&self, symbols: Option<&TickerSet>) -> Result<Vec<LatestPrice>> {
        let inner = self.inner.read().await;
        let since = Utc::now() - Duration::hours(24);

        let targets: Vec<&Ticker> = match symbols {
            Some(set) => set.iter().collect(),
            None => inner
                .registry
                .iter()
                .filter(|(_, active)| **active)
                .map(|(ticker, _)| ticker)
                .collect(),
        };

        Ok(targets
            .into_iter()
            .filter_map(|ticker| inner.series.get(ticker))
            .filter_map(|series| latest_with_change(series, since))
            .collect())
    }

    async fn history_for(
        &self,
        symbol: &Ticker,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<PriceObservation>> {
        let inner = self.inner.read().await;
        let Some(series) = inner.series.get(symbol) else {
            return Ok(Vec::new());
        };

        let mut recent: Vec<PriceObservation> = series
            .range(range.start..=range.end)
            .rev()
            .take(limit)
            .map(|(_, obs)| obs.clone())
            .collect();
        recent.reverse();

        debug!(symbol = %symbol, count = recent.len(), "인메모리 이력 조회");
        Ok(recent)
    }

    async fn summary_for(
        &self,
        symbol: &Ticker,
        window: Duration,
    ) -> Result<Option<PriceSummary>> {
        let inner = self.inner.read().await;
        let Some(series) = inner.series.get(symbol) else {
            return Ok(None);
        };
        let (Some((first_recorded, _)), Some((_, latest))) =
            (series.first_key_value(), series.last_key_value())
        else {
            return Ok(None);
        };

        let since = Utc::now() - window;
        let in_window: Vec<PriceObservation> =
            series.range(since..).map(|(_, obs)| obs.clone()).collect();

        Ok(Some(PriceSummary::build(
            latest,
            &in_window,
            window,
            *first_recorded,
            series.len() as u64,
        )))
    }

    async fn delete_all(&self, symbol: &Ticker) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let deleted = inner
            .series
            .remove(symbol)
            .map(|series| series.len() as u64)
            .unwrap_or(0);
        if let Some(active) = inner.registry.get_mut(symbol) {
            *active = false;
        }
        Ok(deleted)
    }

    async fn tickers(&self) -> Result<Vec<TickerInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .registry
            .iter()
            .map(|(ticker, active)| {
                let series = inner.series.get(ticker);
                TickerInfo {
                    symbol: ticker.clone(),
                    is_active: *active,
                    record_count: series.map(|s| s.len() as u64).unwrap_or(0),
                    last_update: series.and_then(|s| s.last_key_value()).map(|(ts, _)| *ts),
                }
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
