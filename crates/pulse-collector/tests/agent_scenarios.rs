//! CollectorAgent 시나리오 테스트
//!
//! 시뮬레이션 시세 소스와 인메모리 저장소로 시작/중지/변경/강제 수집 흐름을 검증합니다.
//! 모든 테스트는 tokio 가상 시간(start_paused)에서 실행됩니다.

use std::sync::Arc;
use std::time::Duration;

use pulse_collector::stats::OutcomeStatus;
use pulse_collector::{AgentSettings, CollectorAgent, CollectorError, CycleTrigger, RunState};
use pulse_core::{ErrorKind, Ticker, TickerSet, TimeRange};
use pulse_data::{MemoryPriceStore, PriceStore};
use pulse_exchange::{QuoteError, SimulatedQuoteSource};

struct Harness {
    agent: CollectorAgent,
    source: Arc<SimulatedQuoteSource>,
    store: Arc<MemoryPriceStore>,
}

fn harness_with(source: SimulatedQuoteSource, settings: AgentSettings) -> Harness {
    let source = Arc::new(source);
    let store = Arc::new(MemoryPriceStore::new());
    let agent = CollectorAgent::new(
        source.clone(),
        store.clone(),
        settings,
        Duration::from_secs(60),
    );
    Harness {
        agent,
        source,
        store,
    }
}

fn harness() -> Harness {
    harness_with(SimulatedQuoteSource::new(7), AgentSettings::default())
}

fn tickers(list: &[&str]) -> TickerSet {
    TickerSet::parse(list).unwrap()
}

fn ticker(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_double_start_runs_single_loop() {
    let h = harness();

    let first = h
        .agent
        .start(tickers(&["AAPL"]), Duration::from_secs(60))
        .await
        .unwrap();
    assert!(first.changed);

    let second = h
        .agent
        .start(tickers(&["MSFT"]), Duration::from_secs(10))
        .await
        .unwrap();
    assert!(!second.changed);
    // 두 번째 요청은 설정을 바꾸지 않음
    assert_eq!(second.status.tickers, tickers(&["AAPL"]));
    assert_eq!(second.status.interval, Duration::from_secs(60));

    advance(65).await;

    let status = h.agent.status().await;
    assert_eq!(status.stats.cycles_completed, 1);
    assert_eq!(h.source.call_count(&ticker("AAPL")), 1);
    assert_eq!(h.source.call_count(&ticker("MSFT")), 0);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_cycle() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(5)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(30)),
    );

    h.agent
        .start(tickers(&["AAPL", "MSFT"]), Duration::from_secs(10))
        .await
        .unwrap();

    // 첫 사이클은 10초에 시작해 15초에 끝남
    advance(12).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 0);

    let outcome = h.agent.stop().await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.status.state, RunState::Stopped);
    assert_eq!(outcome.status.stats.cycles_completed, 1);
    assert_eq!(outcome.status.stats.successes, 2);
    assert!(outcome.status.next_run_at.is_none());

    advance(60).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 1);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_stop_still_reaches_stopped() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(5)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(30)),
    );

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(10))
        .await
        .unwrap();

    // 10초에 시작한 사이클이 15초까지 진행 중일 때 중지 요청을 1초 만에 포기
    advance(12).await;
    let abandoned = tokio::time::timeout(Duration::from_secs(1), h.agent.stop()).await;
    assert!(abandoned.is_err());

    // 사이클이 끝나면 루프가 스스로 Stopped를 기록
    advance(10).await;
    let status = h.agent.status().await;
    assert_eq!(status.state, RunState::Stopped);
    assert!(status.next_run_at.is_none());
    assert_eq!(status.stats.cycles_completed, 1);

    advance(120).await;
    assert_eq!(h.source.call_count(&ticker("AAPL")), 1);

    // 남은 핸들은 다음 중지가 정리하고, 다시 시작할 수 있음
    let outcome = h.agent.stop().await.unwrap();
    assert_eq!(outcome.status.state, RunState::Stopped);
    let restarted = h
        .agent
        .start(tickers(&["AAPL"]), Duration::from_secs(10))
        .await
        .unwrap();
    assert!(restarted.changed);
    assert_eq!(h.agent.status().await.state, RunState::Running);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_after_abandoned_stop_waits_for_old_loop() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(5)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(30)),
    );

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(10))
        .await
        .unwrap();
    advance(12).await;
    assert!(
        tokio::time::timeout(Duration::from_secs(1), h.agent.stop())
            .await
            .is_err()
    );

    // 이전 루프가 끝난 뒤 새 루프가 시작되고 Running이 유지됨
    let outcome = h
        .agent
        .start(tickers(&["MSFT"]), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(outcome.changed);

    advance(5).await;
    let status = h.agent.status().await;
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.tickers, tickers(&["MSFT"]));
    assert_eq!(status.stats.cycles_completed, 0);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_creates_one_loop() {
    let h = harness();

    let (a, b) = tokio::join!(
        h.agent.start(tickers(&["AAPL"]), Duration::from_secs(60)),
        h.agent.start(tickers(&["MSFT"]), Duration::from_secs(60)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.changed ^ b.changed);

    advance(65).await;

    let status = h.agent.status().await;
    assert_eq!(status.stats.cycles_completed, 1);
    assert_eq!(
        h.source.call_count(&ticker("AAPL")) + h.source.call_count(&ticker("MSFT")),
        1
    );

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_force_collect_while_running_keeps_schedule() {
    let h = harness();

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(60))
        .await
        .unwrap();
    advance(10).await;
    let before = h.agent.status().await;

    let report = h.agent.force_collect().await.unwrap();
    assert_eq!(report.successful_count(), 1);

    let status = h.agent.status().await;
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.next_run_at, before.next_run_at);
    assert_eq!(status.stats.forced_cycles, 1);
    assert_eq!(status.stats.cycles_completed, 0);
    assert_eq!(status.stats.successes, 1);

    // 정기 틱은 여전히 60초, 120초
    advance(55).await;
    let status = h.agent.status().await;
    assert_eq!(status.stats.cycles_completed, 1);
    assert_eq!(status.stats.forced_cycles, 1);
    assert_eq!(status.stats.successes, 2);

    advance(50).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 1);
    advance(10).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 2);
    assert_eq!(h.source.call_count(&ticker("AAPL")), 3);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_forced_cycle_from_before_restart_is_not_counted() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(5)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(30)),
    );
    h.agent.update_symbols(tickers(&["AAPL"])).await.unwrap();

    let agent = h.agent.clone();
    let forced = tokio::spawn(async move { agent.force_collect().await });

    advance(1).await;
    let outcome = h
        .agent
        .start(tickers(&["AAPL"]), Duration::from_secs(60))
        .await
        .unwrap();
    assert!(outcome.changed);

    let report = forced.await.unwrap().unwrap();
    assert_eq!(report.successful_count(), 1);

    // 보고서는 호출자에게 반환되지만 새로 초기화된 통계에는 섞이지 않음
    let status = h.agent.status().await;
    assert_eq!(status.stats.forced_cycles, 0);
    assert_eq!(status.stats.successes, 0);
    assert!(status.last_cycle.is_none());
    assert_eq!(h.store.len().await, 1);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_update_symbols_applies_from_next_cycle() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(5)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(30)),
    );

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(10))
        .await
        .unwrap();

    // 첫 사이클 진행 중에 변경
    advance(12).await;
    let status = h.agent.update_symbols(tickers(&["MSFT"])).await.unwrap();
    assert_eq!(status.tickers, tickers(&["MSFT"]));

    // 두 번째 사이클은 20초에 시작해 25초에 끝남
    advance(14).await;

    let status = h.agent.status().await;
    assert_eq!(status.stats.cycles_completed, 2);
    assert_eq!(h.source.call_count(&ticker("AAPL")), 1);
    assert_eq!(h.source.call_count(&ticker("MSFT")), 1);

    let last = status.last_cycle.unwrap();
    assert_eq!(last.attempted, 1);
    assert_eq!(last.successful, 1);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_force_collect_partial_failure_while_stopped() {
    let h = harness();
    h.source
        .fail_symbol(&ticker("MSFT"), QuoteError::NotFound("MSFT".to_string()));

    h.agent
        .update_symbols(tickers(&["AAPL", "MSFT", "GOOGL"]))
        .await
        .unwrap();

    let report = h.agent.force_collect().await.unwrap();
    assert_eq!(report.trigger, CycleTrigger::Forced);
    assert_eq!(report.successful_count(), 2);
    assert_eq!(report.failed_count(), 1);

    let results = report.results();
    assert_eq!(results.get(&ticker("AAPL")), Some(&true));
    assert_eq!(results.get(&ticker("MSFT")), Some(&false));
    assert_eq!(results.get(&ticker("GOOGL")), Some(&true));

    let status = h.agent.status().await;
    assert_eq!(status.state, RunState::Stopped);
    assert!(status.next_run_at.is_none());
    assert_eq!(status.stats.forced_cycles, 1);
    assert_eq!(status.stats.cycles_completed, 0);
    assert_eq!(status.stats.successes, 2);
    assert_eq!(status.stats.failures, 1);
    assert_eq!(
        status.stats.last_errors.get(&ticker("MSFT")).map(|e| e.kind),
        Some(ErrorKind::NotFound)
    );

    let latest = h
        .store
        .latest_for(Some(&tickers(&["AAPL", "MSFT", "GOOGL"])))
        .await
        .unwrap();
    let mut stored: Vec<String> = latest
        .iter()
        .map(|l| l.observation.symbol.to_string())
        .collect();
    stored.sort();
    assert_eq!(stored, vec!["AAPL".to_string(), "GOOGL".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_is_bounded_by_fetch_timeout() {
    let h = harness_with(
        SimulatedQuoteSource::new(7).with_latency(Duration::from_secs(30)),
        AgentSettings::default().with_fetch_timeout(Duration::from_secs(2)),
    );
    h.agent.update_symbols(tickers(&["AAPL"])).await.unwrap();

    let report = h.agent.force_collect().await.unwrap();
    assert_eq!(report.failed_count(), 1);
    match &report.outcomes[0].status {
        OutcomeStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Unavailable),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(h.store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resets_stats() {
    let h = harness();

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(30))
        .await
        .unwrap();
    advance(65).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 2);
    h.agent.stop().await.unwrap();

    let outcome = h
        .agent
        .start(tickers(&["AAPL"]), Duration::from_secs(30))
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.status.stats.cycles_completed, 0);
    assert_eq!(outcome.status.stats.successes, 0);
    assert!(outcome.status.last_cycle.is_none());

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_keeps_pending_tick() {
    let h = harness();

    h.agent
        .start(tickers(&["AAPL"]), Duration::from_secs(60))
        .await
        .unwrap();

    advance(10).await;
    let status = h.agent.update_interval(Duration::from_secs(30)).await.unwrap();
    assert_eq!(status.interval, Duration::from_secs(30));

    // 예약된 60초 틱은 유지
    advance(45).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 0);
    advance(6).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 1);

    // 이후 틱은 새 주기 (90초)
    advance(28).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 1);
    advance(2).await;
    assert_eq!(h.agent.status().await.stats.cycles_completed, 2);

    h.agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_control_requests() {
    let h = harness();

    assert!(matches!(
        h.agent.force_collect().await,
        Err(CollectorError::InvalidInput(_))
    ));
    assert!(matches!(
        h.agent
            .start(TickerSet::empty(), Duration::from_secs(60))
            .await,
        Err(CollectorError::InvalidInput(_))
    ));
    assert!(matches!(
        h.agent.start(tickers(&["AAPL"]), Duration::ZERO).await,
        Err(CollectorError::InvalidInput(_))
    ));

    let status = h.agent.status().await;
    assert_eq!(status.state, RunState::Stopped);
    assert!(status.stats.started_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_collection_reaches_history() {
    let h = harness();

    h.agent
        .start(tickers(&["AAPL", "MSFT"]), Duration::from_secs(60))
        .await
        .unwrap();
    advance(65).await;

    for symbol in ["AAPL", "MSFT"] {
        let history = h
            .store
            .history_for(
                &ticker(symbol),
                TimeRange::trailing(chrono::Duration::hours(1)),
                100,
            )
            .await
            .unwrap();
        assert!(!history.is_empty(), "{} 이력 없음", symbol);
    }

    let status = h.agent.status().await;
    assert_eq!(status.stats.successes, 2);
    assert!(status.stats.last_cycle_at.is_some());

    h.agent.shutdown().await;
    assert_eq!(h.agent.status().await.state, RunState::Stopped);
}
