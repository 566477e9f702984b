//! 에이전트 실행 설정.

use std::time::Duration;

use pulse_core::CollectorConfig;

/// 수집 사이클 실행 설정.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// 종목당 조회/저장 타임아웃
    pub fetch_timeout: Duration,
    /// 사이클 내 동시 조회 수 (최소 1)
    pub max_concurrency: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

impl From<&CollectorConfig> for AgentSettings {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms.max(1)),
            max_concurrency: config.max_concurrency.max(1),
        }
    }
}

impl AgentSettings {
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }
}
