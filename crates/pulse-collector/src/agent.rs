//! 컬렉터 에이전트.
//!
//! 상태 머신은 `Stopped`와 `Running` 두 상태만 가집니다.
//!
//! - 실행 상태, 티커 집합, 수집 주기, 통계는 하나의 `RwLock<AgentState>`가 보호합니다.
//!   수집 중(업스트림 조회 대기 중)에는 이 락을 잡지 않으므로 상태 조회와
//!   티커/주기 변경이 느린 사이클에 막히지 않습니다.
//! - 시작/중지는 별도의 `Mutex<Option<LoopHandle>>`로 직렬화되어 스케줄 루프가
//!   둘 이상 동시에 실행되지 않습니다.
//! - 중지는 협력적입니다. 취소 토큰을 신호하고 진행 중인 사이클이 끝날 때까지 기다립니다.
//!   중지 요청이 대기 중에 취소되어도 루프는 종료 시 스스로 `Stopped`를 기록하고,
//!   루프 핸들은 태스크가 끝날 때까지 남아 있어 다음 시작/중지가 이어서 정리합니다.
//! - 시작할 때마다 세대 번호가 올라갑니다. 이전 세대에 시작된 사이클의 결과는
//!   새 통계에 반영되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use pulse_core::{collection_span, validate_interval, ErrorKind, PulseError, Ticker, TickerSet};
use pulse_data::PriceStore;
use pulse_exchange::{fetch_with_timeout, QuoteSource};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentSettings;
use crate::error::{CollectorError, Result};
use crate::metrics;
use crate::schedule::{next_tick, wall_clock};
use crate::stats::{
    CollectionStats, CycleReport, CycleSummary, CycleTrigger, OutcomeStatus, SymbolOutcome,
};

/// 에이전트 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
}

/// 에이전트 상태 스냅샷.
///
/// 하나의 읽기 락 안에서 복사되므로 서로 다른 사이클의 통계가 섞이지 않습니다.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub state: RunState,
    pub tickers: TickerSet,
    #[serde(skip)]
    pub interval: Duration,
    pub interval_secs: f64,
    /// 다음 정기 수집 예정 시각 (실행 중일 때만)
    pub next_run_at: Option<DateTime<Utc>>,
    pub stats: CollectionStats,
    pub last_cycle: Option<CycleSummary>,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }
}

/// 시작/중지 요청 결과.
///
/// 이미 해당 상태였다면 `changed`가 `false`입니다.
#[derive(Debug, Clone, Serialize)]
pub struct ControlOutcome {
    pub changed: bool,
    pub status: AgentStatus,
}

struct AgentState {
    run_state: RunState,
    generation: u64,
    tickers: TickerSet,
    interval: Duration,
    next_run_at: Option<DateTime<Utc>>,
    stats: CollectionStats,
    last_cycle: Option<CycleSummary>,
}

impl AgentState {
    fn snapshot(&self) -> AgentStatus {
        AgentStatus {
            state: self.run_state,
            tickers: self.tickers.clone(),
            interval: self.interval,
            interval_secs: self.interval.as_secs_f64(),
            next_run_at: self.next_run_at,
            stats: self.stats.clone(),
            last_cycle: self.last_cycle.clone(),
        }
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn PriceStore>,
    settings: AgentSettings,
    state: RwLock<AgentState>,
    lifecycle: Mutex<Option<LoopHandle>>,
}

/// 시세 수집 에이전트.
///
/// 복제해도 같은 에이전트를 가리킵니다. 프로세스당 하나를 만들어 공유합니다.
#[derive(Clone)]
pub struct CollectorAgent {
    inner: Arc<Inner>,
}

impl CollectorAgent {
    /// 새 에이전트를 생성합니다. 초기 상태는 `Stopped`입니다.
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn PriceStore>,
        settings: AgentSettings,
        default_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                settings,
                state: RwLock::new(AgentState {
                    run_state: RunState::Stopped,
                    generation: 0,
                    tickers: TickerSet::empty(),
                    interval: default_interval,
                    next_run_at: None,
                    stats: CollectionStats::default(),
                    last_cycle: None,
                }),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    /// 수집을 시작합니다.
    ///
    /// 이미 실행 중이면 두 번째 루프를 만들지 않고 `changed = false`를 반환합니다.
    /// 새로 시작하면 통계가 초기화되고 첫 수집은 `interval` 후에 실행됩니다.
    #[instrument(skip(self, tickers), fields(tickers = %tickers))]
    pub async fn start(&self, tickers: TickerSet, interval: Duration) -> Result<ControlOutcome> {
        ensure_tickers(&tickers)?;
        validate_interval(interval)?;

        let mut lifecycle = self.inner.lifecycle.lock().await;

        if let Some(handle) = lifecycle.as_mut() {
            if handle.cancel.is_cancelled() {
                // 완료되지 못한 중지 요청의 루프를 마저 정리
                debug!("이전 스케줄 루프 종료 대기");
                if let Err(e) = (&mut handle.task).await {
                    error!(error = %e, "스케줄 루프 비정상 종료");
                }
            } else if !handle.task.is_finished() {
                info!("이미 수집 중입니다");
                return Ok(ControlOutcome {
                    changed: false,
                    status: self.status().await,
                });
            } else {
                warn!("스케줄 루프가 비정상 종료되어 있어 다시 시작합니다");
            }
            *lifecycle = None;
        }

        let first_tick = Instant::now()
            .checked_add(interval)
            .ok_or_else(|| CollectorError::InvalidInput("수집 주기가 너무 깁니다".to_string()))?;
        let (status, generation) = {
            let mut state = self.inner.state.write().await;
            state.generation += 1;
            state.run_state = RunState::Running;
            state.tickers = tickers.clone();
            state.interval = interval;
            state.next_run_at = Some(wall_clock(first_tick));
            state.stats = CollectionStats::started(Utc::now());
            state.last_cycle = None;
            (state.snapshot(), state.generation)
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            self.inner.clone(),
            cancel.clone(),
            first_tick,
            generation,
        ));
        *lifecycle = Some(LoopHandle { cancel, task });

        metrics::set_running(true);
        metrics::set_active_tickers(tickers.len());
        info!(
            tickers = %tickers,
            interval_secs = interval.as_secs_f64(),
            "수집 시작"
        );

        Ok(ControlOutcome {
            changed: true,
            status,
        })
    }

    /// 수집을 중지합니다.
    ///
    /// 진행 중인 사이클은 중단하지 않고 끝날 때까지 기다립니다.
    /// 이미 중지 상태면 `changed = false`를 반환합니다.
    ///
    /// 대기 중에 호출자가 취소해도 루프는 사이클을 마친 뒤 `Stopped`로 전환됩니다.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<ControlOutcome> {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        let Some(handle) = lifecycle.as_mut() else {
            debug!("이미 중지 상태입니다");
            return Ok(ControlOutcome {
                changed: false,
                status: self.status().await,
            });
        };

        handle.cancel.cancel();
        // 태스크가 끝날 때까지 핸들을 유지
        if let Err(e) = (&mut handle.task).await {
            error!(error = %e, "스케줄 루프 비정상 종료");
        }
        *lifecycle = None;

        let status = {
            let mut state = self.inner.state.write().await;
            state.run_state = RunState::Stopped;
            state.next_run_at = None;
            state.snapshot()
        };
        drop(lifecycle);

        status.stats.log_summary("수집 중지");

        Ok(ControlOutcome {
            changed: true,
            status,
        })
    }

    /// 수집 대상 티커를 교체합니다.
    ///
    /// 진행 중인 사이클에는 영향을 주지 않고 다음 사이클부터 적용됩니다.
    /// 중지 상태에서도 호출할 수 있으며 강제 수집이 이 집합을 사용합니다.
    pub async fn update_symbols(&self, tickers: TickerSet) -> Result<AgentStatus> {
        ensure_tickers(&tickers)?;

        let mut state = self.inner.state.write().await;
        let previous = std::mem::replace(&mut state.tickers, tickers);
        info!(from = %previous, to = %state.tickers, "수집 티커 변경");
        metrics::set_active_tickers(state.tickers.len());

        Ok(state.snapshot())
    }

    /// 수집 주기를 변경합니다.
    ///
    /// 이미 예약된 다음 틱은 그대로 두고, 그 이후의 틱 간격에 적용됩니다.
    pub async fn update_interval(&self, interval: Duration) -> Result<AgentStatus> {
        validate_interval(interval)?;

        let mut state = self.inner.state.write().await;
        let previous = std::mem::replace(&mut state.interval, interval);
        info!(
            from_secs = previous.as_secs_f64(),
            to_secs = interval.as_secs_f64(),
            "수집 주기 변경"
        );

        Ok(state.snapshot())
    }

    /// 현재 티커 집합으로 즉시 한 사이클을 실행합니다.
    ///
    /// 스케줄의 다음 틱은 바뀌지 않으며 중지 상태에서도 상태를 바꾸지 않습니다.
    /// 정기 사이클과 동시에 실행될 수 있습니다.
    pub async fn force_collect(&self) -> Result<CycleReport> {
        let (tickers, generation) = {
            let state = self.inner.state.read().await;
            (state.tickers.clone(), state.generation)
        };
        if tickers.is_empty() {
            return Err(CollectorError::InvalidInput(
                "수집할 티커가 없습니다. 먼저 티커를 설정하세요".to_string(),
            ));
        }

        info!(tickers = %tickers, "강제 수집 실행");
        let report = self.inner.run_cycle(CycleTrigger::Forced, tickers).await;
        self.inner.record(&report, generation).await;
        Ok(report)
    }

    /// 현재 상태 스냅샷.
    pub async fn status(&self) -> AgentStatus {
        self.inner.state.read().await.snapshot()
    }

    /// 실행 중이면 중지합니다. 프로세스 종료 시 호출합니다.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(outcome) if outcome.changed => info!("컬렉터 종료 완료"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "컬렉터 종료 실패"),
        }
    }

    pub fn source_name(&self) -> &str {
        self.inner.source.name()
    }
}

fn ensure_tickers(tickers: &TickerSet) -> Result<()> {
    if tickers.is_empty() {
        return Err(CollectorError::InvalidInput(
            "티커 목록이 비어 있습니다".to_string(),
        ));
    }
    Ok(())
}

/// 스케줄 루프.
///
/// 취소는 틱 대기 중이거나 사이클이 끝난 직후에만 반영됩니다.
/// 종료할 때 자기 세대의 실행 상태를 `Stopped`로 되돌립니다.
async fn run_loop(
    inner: Arc<Inner>,
    cancel: CancellationToken,
    first_tick: Instant,
    generation: u64,
) {
    let mut tick = first_tick;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(tick) => {}
        }

        // 사이클 시작 시점의 티커 스냅샷
        let tickers = inner.state.read().await.tickers.clone();
        let report = inner.run_cycle(CycleTrigger::Scheduled, tickers).await;
        inner.record(&report, generation).await;

        if cancel.is_cancelled() {
            break;
        }

        let mut state = inner.state.write().await;
        tick = next_tick(tick, state.interval, Instant::now());
        state.next_run_at = Some(wall_clock(tick));
    }

    {
        let mut state = inner.state.write().await;
        if state.generation == generation {
            state.run_state = RunState::Stopped;
            state.next_run_at = None;
        }
    }
    metrics::set_running(false);
    debug!(generation, "스케줄 루프 종료");
}

impl Inner {
    async fn run_cycle(&self, trigger: CycleTrigger, tickers: TickerSet) -> CycleReport {
        let span = collection_span!("collection_cycle", trigger, tickers);

        async {
            let started_at = Utc::now();
            let clock = Instant::now();

            let outcomes: Vec<SymbolOutcome> = stream::iter(tickers.iter().cloned())
                .map(|symbol| self.collect_symbol(symbol))
                .buffered(self.settings.max_concurrency)
                .collect()
                .await;

            let report = CycleReport {
                id: Uuid::new_v4(),
                trigger,
                started_at,
                finished_at: Utc::now(),
                outcomes,
            };

            metrics::record_cycle(&report, clock.elapsed());
            info!(
                successful = report.successful_count(),
                failed = report.failed_count(),
                elapsed_ms = clock.elapsed().as_millis() as u64,
                "수집 사이클 완료"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// 한 종목을 조회하고 즉시 저장합니다. 실패는 결과로 반환하며 전파하지 않습니다.
    async fn collect_symbol(&self, symbol: Ticker) -> SymbolOutcome {
        let timeout = self.settings.fetch_timeout;

        let status = match fetch_with_timeout(self.source.as_ref(), &symbol, timeout).await {
            Ok(observation) => {
                match tokio::time::timeout(timeout, self.store.append(&observation)).await {
                    Ok(Ok(stored)) => OutcomeStatus::Collected {
                        observed_at: observation.observed_at,
                        close: observation.close,
                        stored,
                    },
                    Ok(Err(e)) => {
                        let err = PulseError::from(e);
                        OutcomeStatus::Failed {
                            kind: err.kind(),
                            message: err.to_string(),
                        }
                    }
                    Err(_) => OutcomeStatus::Failed {
                        kind: ErrorKind::Unavailable,
                        message: format!("저장 타임아웃 ({}ms)", timeout.as_millis()),
                    },
                }
            }
            Err(e) => OutcomeStatus::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        };

        match &status {
            OutcomeStatus::Collected { close, .. } => {
                debug!(symbol = %symbol, close = %close, "수집 성공");
            }
            OutcomeStatus::Failed { kind, message } => {
                warn!(symbol = %symbol, kind = %kind, error = %message, "수집 실패");
            }
        }

        SymbolOutcome { symbol, status }
    }

    /// 사이클 결과를 통계에 한 번에 반영합니다.
    ///
    /// 사이클이 도는 사이 새로 시작되었다면 이전 세대의 결과는 버립니다.
    async fn record(&self, report: &CycleReport, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(
                cycle_id = %report.id,
                generation,
                current = state.generation,
                "이전 세대 사이클 결과는 통계에서 제외"
            );
            return;
        }
        state.stats.apply(report);
        state.last_cycle = Some(report.summary());
    }
}
