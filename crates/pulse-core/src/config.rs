//! 설정 관리.
//!
//! 기본값 → 설정 파일(선택) → 환경 변수(`PULSE__SECTION__KEY`) 순서로 덮어씁니다.
//! 편의를 위해 `DATABASE_URL`, `API_HOST`, `API_PORT`도 인식합니다.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::{LogConfig, LogFormat};

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 컬렉터 설정
    pub collector: CollectorConfig,
    /// 시세 소스 설정
    pub quote_source: QuoteSourceConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용 CORS origin (비어 있으면 모두 허용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 60,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 바인딩 주소를 파싱합니다.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 데이터베이스 설정.
///
/// `url`이 없으면 인메모리 저장소를 사용합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

/// 컬렉터 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 기본 수집 티커
    pub default_tickers: Vec<String>,
    /// 기본 수집 주기 (초)
    pub default_interval_secs: u64,
    /// 허용 최소 주기 (초)
    pub min_interval_secs: u64,
    /// 허용 최대 주기 (초)
    pub max_interval_secs: u64,
    /// 종목당 조회/저장 타임아웃 (밀리초)
    pub fetch_timeout_ms: u64,
    /// 사이클 내 동시 조회 수
    pub max_concurrency: usize,
    /// 서버 시작 시 기본 티커로 자동 수집
    pub autostart: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            default_tickers: ["AAPL", "MSFT", "GOOGL", "TSLA", "AMZN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_interval_secs: 60,
            min_interval_secs: 30,
            max_interval_secs: 3600,
            fetch_timeout_ms: 10_000,
            max_concurrency: 4,
            autostart: false,
        }
    }
}

/// 시세 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSourceKind {
    /// Yahoo Finance
    #[default]
    Yahoo,
    /// 오프라인 시뮬레이션
    Simulated,
}

/// 시세 소스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuoteSourceConfig {
    pub kind: QuoteSourceKind,
    /// 시뮬레이션 난수 시드
    pub seed: u64,
    /// 시뮬레이션 응답 지연 (밀리초)
    pub latency_ms: u64,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            kind: QuoteSourceKind::Yahoo,
            seed: 42,
            latency_ms: 0,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 출력 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,pulse_collector=info,pulse_api=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// 로깅 초기화용 설정으로 변환합니다. 알 수 없는 형식은 pretty로 처리합니다.
    pub fn to_log_config(&self) -> LogConfig {
        let format = self.format.parse().unwrap_or(LogFormat::Pretty);
        LogConfig::new(self.level.clone()).with_format(format)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다. 파일은 없어도 됩니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("collector.default_tickers")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("API_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.default_tickers, vec!["AAPL", "MSFT", "GOOGL", "TSLA", "AMZN"]);
        assert_eq!(config.default_interval_secs, 60);
        assert_eq!(config.min_interval_secs, 30);
        assert_eq!(config.max_interval_secs, 3600);
        assert!(!config.autostart);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let json = r#"{"collector": {"max_concurrency": 8}, "quote_source": {"kind": "simulated"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.collector.max_concurrency, 8);
        assert_eq!(config.collector.default_interval_secs, 60);
        assert_eq!(config.quote_source.kind, QuoteSourceKind::Simulated);
        assert_eq!(config.server.port, 8000);
        assert!(config.database.url.is_none());
        assert!(config.server.cors_origins.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(server.socket_addr().unwrap().port(), 9000);

        let invalid = ServerConfig {
            host: "not a host".into(),
            ..Default::default()
        };
        assert!(invalid.socket_addr().is_err());
    }

    #[test]
    fn test_logging_config_conversion() {
        let logging = LoggingConfig {
            level: "debug".into(),
            format: "json".into(),
        };
        let log = logging.to_log_config();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);

        let fallback = LoggingConfig {
            level: "info".into(),
            format: "fancy".into(),
        };
        assert_eq!(fallback.to_log_config().format, LogFormat::Pretty);
    }
}
