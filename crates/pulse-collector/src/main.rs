//! Standalone collector CLI.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulse_collector::{AgentSettings, CollectorAgent};
use pulse_core::{
    init_logging, validate_interval_secs, AppConfig, CollectorConfig, PulseResult, TickerSet,
};
use pulse_data::connect_store;
use pulse_exchange::build_source;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "pulse-collector")]
#[command(about = "MarketPulse Standalone Price Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// 로그 레벨 (설정 파일 값을 덮어씀)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 종료 시그널까지 주기적으로 수집
    Run {
        /// 수집할 티커 (쉼표로 구분, 예: "AAPL,MSFT")
        #[arg(long)]
        tickers: Option<String>,

        /// 수집 주기 (초)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// 한 번 수집하고 결과를 JSON으로 출력
    Once {
        /// 수집할 티커 (쉼표로 구분)
        #[arg(long)]
        tickers: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config).context("설정 로드 실패")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(config.logging.to_log_config())?;

    info!("MarketPulse Collector 시작");

    let store = connect_store(&config.database).await?;
    let source = build_source(
        &config.quote_source,
        Duration::from_millis(config.collector.fetch_timeout_ms),
    )?;
    let agent = CollectorAgent::new(
        source,
        store,
        AgentSettings::from(&config.collector),
        Duration::from_secs(config.collector.default_interval_secs),
    );

    let resolve_tickers = |raw: Option<String>| -> anyhow::Result<TickerSet> {
        let set = match raw {
            Some(csv) => TickerSet::parse_csv(&csv)?,
            None => TickerSet::parse(&config.collector.default_tickers)?,
        };
        Ok(set)
    };

    match cli.command {
        Commands::Run { tickers: raw, interval } => {
            let tickers = resolve_tickers(raw)?;
            let interval = resolve_interval(interval, &config.collector)?;

            agent.start(tickers, interval).await?;
            info!(
                "=== 데몬 모드 시작 (주기: {}초) ===",
                interval.as_secs()
            );

            let mut heartbeat = tokio::time::interval(interval.max(Duration::from_secs(60)) * 5);
            heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            heartbeat.tick().await;

            tokio::select! {
                _ = shutdown_signal() => {}
                _ = async {
                    loop {
                        heartbeat.tick().await;
                        agent.status().await.stats.log_summary("수집 진행");
                    }
                } => {}
            }

            agent.shutdown().await;
        }
        Commands::Once { tickers: raw } => {
            agent.update_symbols(resolve_tickers(raw)?).await?;
            let report = agent.force_collect().await?;

            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.successful_count() == 0 {
                error!(failed = report.failed_count(), "모든 종목 수집 실패");
                std::process::exit(1);
            }
        }
    }

    info!("MarketPulse Collector 종료");
    Ok(())
}

/// `--interval` 값을 API와 같은 허용 범위로 검증합니다. 없으면 설정 기본값.
fn resolve_interval(requested: Option<u64>, config: &CollectorConfig) -> PulseResult<Duration> {
    validate_interval_secs(
        requested.unwrap_or(config.default_interval_secs),
        config.min_interval_secs,
        config.max_interval_secs,
    )
}

/// Ctrl+C 또는 SIGTERM 대기.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
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
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Ctrl+C 수신, 수집 중지 중..."),
        _ = terminate => warn!("SIGTERM 수신, 수집 중지 중..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_interval_uses_configured_bounds() {
        let config = CollectorConfig::default();

        assert_eq!(
            resolve_interval(None, &config).unwrap(),
            Duration::from_secs(config.default_interval_secs)
        );
        assert_eq!(
            resolve_interval(Some(120), &config).unwrap(),
            Duration::from_secs(120)
        );
        assert!(resolve_interval(Some(config.min_interval_secs - 1), &config).is_err());
        assert!(resolve_interval(Some(config.max_interval_secs + 1), &config).is_err());
        assert!(resolve_interval(Some(u64::MAX), &config).is_err());
    }
}
