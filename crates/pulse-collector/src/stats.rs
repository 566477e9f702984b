//! 수집 통계 및 사이클 결과.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use pulse_core::{ErrorKind, Ticker};
use pulse_data::AppendOutcome;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// 사이클 실행 계기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    /// 스케줄러 틱
    Scheduled,
    /// 강제 수집 요청
    Forced,
}

impl fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleTrigger::Scheduled => write!(f, "scheduled"),
            CycleTrigger::Forced => write!(f, "forced"),
        }
    }
}

/// 종목별 수집 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// 조회 및 저장 성공
    Collected {
        observed_at: DateTime<Utc>,
        close: Decimal,
        stored: AppendOutcome,
    },
    /// 조회 또는 저장 실패
    Failed { kind: ErrorKind, message: String },
}

/// 한 종목의 사이클 내 시도 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolOutcome {
    pub symbol: Ticker,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl SymbolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Collected { .. })
    }
}

/// 한 사이클의 전체 결과.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SymbolOutcome>,
}

impl CycleReport {
    pub fn successful_count(&self) -> u64 {
        self.outcomes.iter().filter(|o| o.is_success()).count() as u64
    }

    pub fn failed_count(&self) -> u64 {
        self.outcomes.len() as u64 - self.successful_count()
    }

    /// 종목 → 성공 여부.
    pub fn results(&self) -> BTreeMap<Ticker, bool> {
        self.outcomes
            .iter()
            .map(|o| (o.symbol.clone(), o.is_success()))
            .collect()
    }

    pub fn summary(&self) -> CycleSummary {
        CycleSummary {
            id: self.id,
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: self.finished_at,
            attempted: self.outcomes.len() as u64,
            successful: self.successful_count(),
            failed: self.failed_count(),
        }
    }
}

/// 상태 조회용 사이클 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub id: Uuid,
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempted: u64,
    pub successful: u64,
    pub failed: u64,
}

/// 종목별 최근 실패.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// 수집 통계.
///
/// 새로 시작(Stopped → Running)할 때만 초기화됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// 완료된 정기 사이클 수
    pub cycles_completed: u64,
    /// 완료된 강제 사이클 수
    pub forced_cycles: u64,
    /// 종목 단위 성공 수 (정기 + 강제)
    pub successes: u64,
    /// 종목 단위 실패 수 (정기 + 강제)
    pub failures: u64,
    /// 수집 시작 시각
    pub started_at: Option<DateTime<Utc>>,
    /// 마지막 사이클 완료 시각
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// 종목별 최근 실패 (이후 성공하면 제거)
    pub last_errors: BTreeMap<Ticker, SymbolError>,
}

impl CollectionStats {
    /// 시작 시각이 기록된 새 통계.
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(at),
            ..Default::default()
        }
    }

    /// 한 사이클의 결과를 한 번에 반영합니다.
    pub fn apply(&mut self, report: &CycleReport) {
        match report.trigger {
            CycleTrigger::Scheduled => self.cycles_completed += 1,
            CycleTrigger::Forced => self.forced_cycles += 1,
        }

        for outcome in &report.outcomes {
            match &outcome.status {
                OutcomeStatus::Collected { .. } => {
                    self.successes += 1;
                    self.last_errors.remove(&outcome.symbol);
                }
                OutcomeStatus::Failed { kind, message } => {
                    self.failures += 1;
                    self.last_errors.insert(
                        outcome.symbol.clone(),
                        SymbolError {
                            kind: *kind,
                            message: message.clone(),
                            at: report.finished_at,
                        },
                    );
                }
            }
        }

        self.last_cycle_at = Some(report.finished_at);
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            (self.successes as f64 / total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        let elapsed = self
            .started_at
            .map(|at| (Utc::now() - at).num_seconds())
            .unwrap_or(0);

        tracing::info!(
            operation = operation,
            cycles = self.cycles_completed,
            forced = self.forced_cycles,
            successes = self.successes,
            failures = self.failures,
            failing_symbols = self.last_errors.len(),
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{}s", elapsed),
            "수집 통계"
        );
    }
}
