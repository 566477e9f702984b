//! MarketPulse API 서버.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pulse_api::{create_router, setup_metrics_recorder, AppState};
use pulse_collector::{AgentSettings, CollectorAgent, ControlOutcome};
use pulse_core::{init_logging, AppConfig, PulseResult, TickerSet};
use pulse_data::connect_store;
use pulse_exchange::build_source;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("설정 로드 실패")?;
    init_logging(config.logging.to_log_config())?;

    info!("Starting MarketPulse API server...");

    let metrics_handle = match setup_metrics_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics recorder initialized");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Prometheus 레코더 설치 실패 - /metrics 비활성화");
            None
        }
    };

    let addr = config.server.socket_addr().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. API_HOST, API_PORT 환경변수를 확인하세요."
        );
        e
    })?;

    // 저장소 연결 실패는 치명적
    let store = connect_store(&config.database)
        .await
        .context("저장소 연결 실패")?;
    let source = build_source(
        &config.quote_source,
        Duration::from_millis(config.collector.fetch_timeout_ms),
    )?;

    let agent = CollectorAgent::new(
        source,
        store.clone(),
        AgentSettings::from(&config.collector),
        Duration::from_secs(config.collector.default_interval_secs),
    );

    let state = Arc::new(AppState::new(agent.clone(), store, config.collector.clone()));
    info!(
        version = %state.version,
        store = state.store.backend(),
        source = agent.source_name(),
        "Application state initialized"
    );

    if config.collector.autostart {
        autostart(&state).await;
    }

    let app = create_router(
        state,
        metrics_handle,
        Duration::from_secs(config.server.request_timeout_secs),
        &config.server.cors_origins,
    );

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown initiated, stopping collector...");

    // 진행 중인 사이클 완료 대기 (최대 30초)
    if tokio::time::timeout(Duration::from_secs(30), agent.shutdown())
        .await
        .is_err()
    {
        warn!("컬렉터 종료 타임아웃, 강제 종료");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// 기본 티커로 수집을 자동 시작합니다. 실패해도 서버는 계속 실행됩니다.
async fn autostart(state: &AppState) {
    match start_default(state).await {
        Ok(outcome) => info!(
            tickers = %outcome.status.tickers,
            interval_secs = outcome.status.interval_secs,
            "컬렉터 자동 시작"
        ),
        Err(e) => error!(error = %e, "컬렉터 자동 시작 실패"),
    }
}

async fn start_default(state: &AppState) -> PulseResult<ControlOutcome> {
    let tickers = TickerSet::parse(&state.collector.default_tickers)?;
    let interval = state.resolve_interval(None)?;
    Ok(state.agent.start(tickers, interval).await?)
}

/// Graceful shutdown 시그널 대기 (Ctrl+C 또는 SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
