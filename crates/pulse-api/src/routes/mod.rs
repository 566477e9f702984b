//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/tickers` - 컬렉터 제어 (시작/중지/티커/주기/강제 수집)
//! - `/api/v1/prices` - 시세 조회 및 종목 데이터 삭제

pub mod collector;
pub mod health;
pub mod prices;

pub use collector::{
    collector_router, ForceCollectResponse, IntervalRequest, StartRequest, StopResponse,
    UpdateTickersRequest,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use prices::{
    prices_router, DeleteResponse, HistoryResponse, LatestPricesResponse, TickersResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/tickers", collector_router())
        .nest("/api/v1/prices", prices_router())
}
