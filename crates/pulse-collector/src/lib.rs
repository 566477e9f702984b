//! MarketPulse 컬렉터 에이전트.
//!
//! 이 crate는 다음을 제공합니다:
//! - `CollectorAgent`: 시작/중지 가능한 주기 수집 에이전트
//! - 수집 사이클 실행 (종목별 독립 조회/저장, 부분 실패 허용)
//! - 수집 통계 집계
//! - 독립 실행 CLI (`pulse-collector`)

pub mod agent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod schedule;
pub mod stats;

pub use agent::{AgentStatus, CollectorAgent, ControlOutcome, RunState};
pub use config::AgentSettings;
pub use error::{CollectorError, Result};
pub use stats::{CollectionStats, CycleReport, CycleSummary, CycleTrigger, SymbolError, SymbolOutcome};
