//! 저장소 인터페이스.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use pulse_core::{
    DatabaseConfig, LatestPrice, PriceObservation, PriceSummary, Ticker, TickerInfo, TickerSet,
    TimeRange,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{MemoryPriceStore, PgPriceStore, Result};

/// 추가 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    /// 새 레코드
    Inserted,
    /// 같은 (symbol, observed_at) 레코드를 새 값으로 덮어씀
    Replaced,
}

/// 시세 관측치 저장소.
///
/// 컬렉터는 `append`만 사용하고, 나머지는 조회 API가 사용합니다.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// 저장소 종류 (로그/헬스체크용).
    fn backend(&self) -> &'static str;

    /// 관측치를 저장합니다.
    ///
    /// (symbol, observed_at) 기준 멱등: 같은 키는 새 값으로 덮어쓰며 중복 키 에러를 내지 않습니다.
    /// 해당 티커는 활성 상태로 등록됩니다.
    async fn append(&self, observation: &PriceObservation) -> Result<AppendOutcome>;

    /// 종목별 최신 관측치와 24시간 변화를 조회합니다.
    ///
    /// `symbols`가 없으면 활성 티커 전체. 데이터 없는 종목은 생략합니다.
    async fn latest_for(&self, symbols: Option<&TickerSet>) -> Result<Vec<LatestPrice>>;

    /// 구간 내 관측치를 시간 오름차순으로 조회합니다.
    ///
    /// `limit`보다 많으면 가장 최근 `limit`개를 반환합니다.
    async fn history_for(
        &self,
        symbol: &Ticker,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<PriceObservation>>;

    /// 최근 `window` 구간의 요약 통계. 데이터가 전혀 없으면 `None`.
    async fn summary_for(&self, symbol: &Ticker, window: Duration)
        -> Result<Option<PriceSummary>>;

    /// 종목의 모든 관측치를 삭제하고 티커를 비활성화합니다. 삭제된 수를 반환합니다.
    async fn delete_all(&self, symbol: &Ticker) -> Result<u64>;

    /// 티커 레지스트리 조회.
    async fn tickers(&self) -> Result<Vec<TickerInfo>>;

    /// 헬스체크.
    async fn ping(&self) -> Result<()>;
}

/// 설정에 따라 저장소를 연결합니다.
///
/// URL이 없으면 인메모리 저장소를 사용합니다.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn PriceStore>> {
    match &config.url {
        Some(url) => {
            let store = PgPriceStore::connect(url, config).await?;
            store.migrate().await?;
            info!(backend = "postgres", "저장소 연결 완료");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL 미설정 - 인메모리 저장소 사용 (재시작 시 데이터 유실)");
            Ok(Arc::new(MemoryPriceStore::new()))
        }
    }
}
