//! 조회용 파생 모델: 최신가, 요약 통계, 티커 레지스트리, 시간 범위.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PriceObservation;
use crate::error::{PulseError, PulseResult};
use crate::types::Ticker;

/// 조회 시간 범위 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> PulseResult<Self> {
        if start > end {
            return Err(PulseError::InvalidInput(format!(
                "시작 시각({})이 종료 시각({})보다 늦습니다",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// 현재 시각까지의 최근 구간.
    pub fn trailing(window: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - window,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// 가격 변화량과 변화율(%)을 계산합니다.
///
/// 기준가가 0이면 변화율은 `None`입니다.
pub fn price_change(reference: Decimal, latest: Decimal) -> (Decimal, Option<Decimal>) {
    let change = latest - reference;
    let percent = if reference.is_zero() {
        None
    } else {
        Some((change / reference * Decimal::ONE_HUNDRED).round_dp(4))
    };
    (change, percent)
}

/// 종목별 최신 관측치와 24시간 변화.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPrice {
    #[serde(flatten)]
    pub observation: PriceObservation,
    /// 24시간 구간 최초 종가 대비 변화량
    pub change_24h: Option<Decimal>,
    /// 24시간 구간 최초 종가 대비 변화율 (%)
    pub change_percent_24h: Option<Decimal>,
}

impl LatestPrice {
    /// 최신 관측치와 24시간 구간의 가장 이른 관측치로 생성합니다.
    ///
    /// 기준 관측치가 없거나 최신 관측치 자신이면 변화는 비어 있습니다.
    pub fn new(observation: PriceObservation, reference: Option<&PriceObservation>) -> Self {
        let (change_24h, change_percent_24h) = match reference {
            Some(r) if r.observed_at < observation.observed_at => {
                let (change, percent) = price_change(r.close, observation.close);
                (Some(change), percent)
            }
            _ => (None, None),
        };
        Self {
            observation,
            change_24h,
            change_percent_24h,
        }
    }
}

/// 종목별 구간 요약 통계.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub symbol: Ticker,
    /// 구간 길이 (시간)
    pub window_hours: i64,
    /// 전체 기간 최신 종가
    pub latest_price: Decimal,
    /// 구간 최고가
    pub high: Option<Decimal>,
    /// 구간 최저가
    pub low: Option<Decimal>,
    /// 구간 거래량 합계
    pub volume: Option<Decimal>,
    /// 구간 최초 종가 대비 변화량
    pub price_change: Option<Decimal>,
    /// 구간 최초 종가 대비 변화율 (%)
    pub price_change_percent: Option<Decimal>,
    /// 구간 내 레코드 수
    pub window_records: u64,
    /// 최초 수집 시각
    pub first_recorded: DateTime<Utc>,
    /// 최근 수집 시각
    pub last_updated: DateTime<Utc>,
    /// 전체 레코드 수
    pub total_records: u64,
}

impl PriceSummary {
    /// 최신 관측치, 구간 관측치(시간 오름차순), 전체 통계로 요약을 만듭니다.
    pub fn build(
        latest: &PriceObservation,
        window: &[PriceObservation],
        window_len: Duration,
        first_recorded: DateTime<Utc>,
        total_records: u64,
    ) -> Self {
        let high = window.iter().map(|o| o.high).max();
        let low = window.iter().map(|o| o.low).min();
        let volume = if window.is_empty() {
            None
        } else {
            Some(window.iter().map(|o| o.volume).sum())
        };

        let (price_change, price_change_percent) = match (window.first(), window.last()) {
            (Some(first), Some(last)) if first.observed_at < last.observed_at => {
                let (change, percent) = price_change(first.close, last.close);
                (Some(change), percent)
            }
            _ => (None, None),
        };

        Self {
            symbol: latest.symbol.clone(),
            window_hours: window_len.num_hours(),
            latest_price: latest.close,
            high,
            low,
            volume,
            price_change,
            price_change_percent,
            window_records: window.len() as u64,
            first_recorded,
            last_updated: latest.observed_at,
            total_records,
        }
    }
}

/// 티커 레지스트리 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerInfo {
    pub symbol: Ticker,
    /// 수집 대상 여부 (데이터 삭제 시 비활성화)
    pub is_active: bool,
    pub record_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}
