//! 애플리케이션 공유 상태.

use std::sync::Arc;
use std::time::Duration;

use pulse_collector::CollectorAgent;
use pulse_core::{validate_interval_secs, CollectorConfig, PulseResult};
use pulse_data::PriceStore;

/// 핸들러 간 공유 상태.
pub struct AppState {
    /// 프로세스 단일 컬렉터 에이전트
    pub agent: CollectorAgent,

    /// 시세 저장소
    pub store: Arc<dyn PriceStore>,

    /// 컬렉터 설정 (기본 티커, 주기 범위)
    pub collector: CollectorConfig,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    pub fn new(
        agent: CollectorAgent,
        store: Arc<dyn PriceStore>,
        collector: CollectorConfig,
    ) -> Self {
        Self {
            agent,
            store,
            collector,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 요청된 수집 주기를 설정 범위로 검증합니다. 없으면 기본값.
    pub fn resolve_interval(&self, secs: Option<u64>) -> PulseResult<Duration> {
        validate_interval_secs(
            secs.unwrap_or(self.collector.default_interval_secs),
            self.collector.min_interval_secs,
            self.collector.max_interval_secs,
        )
    }

    /// 저장소 연결 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 인메모리 저장소와 시뮬레이션 시세 소스를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use pulse_collector::AgentSettings;
    use pulse_data::MemoryPriceStore;
    use pulse_exchange::SimulatedQuoteSource;

    let store: Arc<dyn PriceStore> = Arc::new(MemoryPriceStore::new());
    let config = CollectorConfig::default();
    let agent = CollectorAgent::new(
        Arc::new(SimulatedQuoteSource::new(42)),
        store.clone(),
        AgentSettings::from(&config),
        Duration::from_secs(config.default_interval_secs),
    );

    AppState::new(agent, store, config)
}
