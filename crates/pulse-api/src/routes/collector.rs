//! 컬렉터 제어 endpoint.
//!
//! 수집 시작/중지, 티커 및 주기 변경, 강제 수집, 상태 조회를 제공합니다.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pulse_collector::{AgentStatus, CycleReport};
use pulse_core::TickerSet;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{api_error, validation_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ==================== 요청/응답 타입 ====================

/// 수집 시작 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct StartRequest {
    /// 수집할 티커 목록
    #[validate(length(min = 1, max = 100, message = "티커는 1-100개 사이여야 합니다"))]
    pub tickers: Vec<String>,
    /// 수집 주기 (초, 선택, 기본 60)
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

/// 티커 변경 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTickersRequest {
    #[validate(length(min = 1, max = 100, message = "티커는 1-100개 사이여야 합니다"))]
    pub tickers: Vec<String>,
}

/// 주기 변경 요청.
#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub interval_secs: u64,
}

/// 수집 중지 응답.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    /// 이번 요청으로 중지되었는지 여부 (이미 중지 상태였다면 false)
    pub stopped: bool,
    pub status: AgentStatus,
}

/// 강제 수집 응답.
#[derive(Debug, Serialize)]
pub struct ForceCollectResponse {
    #[serde(flatten)]
    pub report: CycleReport,
    pub successful_count: u64,
    pub failed_count: u64,
}

impl From<CycleReport> for ForceCollectResponse {
    fn from(report: CycleReport) -> Self {
        Self {
            successful_count: report.successful_count(),
            failed_count: report.failed_count(),
            report,
        }
    }
}

// ==================== 핸들러 ====================

/// 컬렉터 상태 조회
///
/// GET /api/v1/tickers/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<AgentStatus> {
    Json(state.agent.status().await)
}

/// 수집 시작
///
/// POST /api/v1/tickers/start
pub async fn start_collection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<AgentStatus>> {
    request.validate().map_err(validation_error)?;

    let tickers = TickerSet::parse(&request.tickers).map_err(api_error)?;
    let interval = state
        .resolve_interval(request.interval_secs)
        .map_err(api_error)?;

    let outcome = state
        .agent
        .start(tickers, interval)
        .await
        .map_err(api_error)?;

    if !outcome.changed {
        let details = serde_json::to_value(&outcome.status).unwrap_or_default();
        return Err((
            StatusCode::CONFLICT,
            Json(ApiErrorResponse::with_details(
                "ALREADY_RUNNING",
                "컬렉터가 이미 실행 중입니다",
                details,
            )),
        ));
    }

    Ok(Json(outcome.status))
}

/// 수집 중지
///
/// 진행 중인 사이클이 끝날 때까지 기다린 뒤 응답합니다.
/// POST /api/v1/tickers/stop
pub async fn stop_collection(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StopResponse>> {
    let outcome = state.agent.stop().await.map_err(api_error)?;

    Ok(Json(StopResponse {
        stopped: outcome.changed,
        status: outcome.status,
    }))
}

/// 수집 티커 변경
///
/// POST /api/v1/tickers/update
pub async fn update_tickers(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateTickersRequest>,
) -> ApiResult<Json<AgentStatus>> {
    request.validate().map_err(validation_error)?;

    let tickers = TickerSet::parse(&request.tickers).map_err(api_error)?;
    let status = state
        .agent
        .update_symbols(tickers)
        .await
        .map_err(api_error)?;

    Ok(Json(status))
}

/// 수집 주기 변경
///
/// POST /api/v1/tickers/interval
pub async fn update_interval(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntervalRequest>,
) -> ApiResult<Json<AgentStatus>> {
    let interval = state
        .resolve_interval(Some(request.interval_secs))
        .map_err(api_error)?;
    let status = state
        .agent
        .update_interval(interval)
        .await
        .map_err(api_error)?;

    Ok(Json(status))
}

/// 강제 수집
///
/// 현재 티커로 즉시 한 사이클을 실행하고 종목별 결과를 반환합니다.
/// POST /api/v1/tickers/force
pub async fn force_collect(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ForceCollectResponse>> {
    let report = state.agent.force_collect().await.map_err(api_error)?;
    info!(
        successful = report.successful_count(),
        failed = report.failed_count(),
        "API 강제 수집 완료"
    );

    Ok(Json(report.into()))
}

pub fn collector_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_collection))
        .route("/stop", post(stop_collection))
        .route("/update", post(update_tickers))
        .route("/interval", post(update_interval))
        .route("/force", post(force_collect))
}

// ==================== 테스트 ====================
