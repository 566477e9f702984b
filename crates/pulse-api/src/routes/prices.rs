//! 시세 조회 endpoint.
//!
//! 수집된 관측치의 최신가, 이력, 요약 통계, 티커 레지스트리 조회와 종목 데이터 삭제를 제공합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use pulse_core::{LatestPrice, PriceObservation, PriceSummary, Ticker, TickerInfo, TickerSet, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::error::{api_error, reject, validation_error, ApiResult};
use crate::state::AppState;

// ==================== 쿼리 파라미터 ====================

fn default_hours() -> u32 {
    24
}

fn default_limit() -> u32 {
    100
}

/// 최신가 조회 쿼리.
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    /// 쉼표로 구분된 티커 (없으면 활성 티커 전체)
    #[serde(default)]
    pub tickers: Option<String>,
}

/// 이력 조회 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    /// 조회 구간 (시간, 1-168)
    #[serde(default = "default_hours")]
    #[validate(range(min = 1, max = 168, message = "hours는 1-168 사이여야 합니다"))]
    pub hours: u32,
    /// 최대 레코드 수 (1-1000)
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit는 1-1000 사이여야 합니다"))]
    pub limit: u32,
}

/// 요약 조회 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct SummaryQuery {
    #[serde(default = "default_hours")]
    #[validate(range(min = 1, max = 168, message = "hours는 1-168 사이여야 합니다"))]
    pub hours: u32,
}

/// 삭제 확인 쿼리.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

// ==================== 응답 타입 ====================

#[derive(Debug, Serialize)]
pub struct LatestPricesResponse {
    pub prices: Vec<LatestPrice>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub symbol: Ticker,
    pub hours: u32,
    pub count: usize,
    /// 시간 오름차순
    pub data: Vec<PriceObservation>,
}

#[derive(Debug, Serialize)]
pub struct TickersResponse {
    pub tickers: Vec<TickerInfo>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub symbol: Ticker,
    pub deleted_records: u64,
}

// ==================== 핸들러 ====================

/// 최신가 조회
///
/// GET /api/v1/prices/latest?tickers=AAPL,MSFT
pub async fn get_latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<LatestPricesResponse>> {
    let filter = match query.tickers.as_deref() {
        Some(csv) if !csv.trim().is_empty() => Some(TickerSet::parse_csv(csv).map_err(api_error)?),
        _ => None,
    };

    let prices = state
        .store
        .latest_for(filter.as_ref())
        .await
        .map_err(api_error)?;

    Ok(Json(LatestPricesResponse {
        count: prices.len(),
        prices,
    }))
}

/// 가격 이력 조회
///
/// GET /api/v1/prices/history/{symbol}?hours=24&limit=100
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    query.validate().map_err(validation_error)?;
    let symbol = Ticker::parse(&symbol).map_err(api_error)?;

    let range = TimeRange::trailing(chrono::Duration::hours(i64::from(query.hours)));
    let data = state
        .store
        .history_for(&symbol, range, query.limit as usize)
        .await
        .map_err(api_error)?;

    Ok(Json(HistoryResponse {
        symbol,
        hours: query.hours,
        count: data.len(),
        data,
    }))
}

/// 요약 통계 조회
///
/// 데이터가 전혀 없으면 404.
/// GET /api/v1/prices/summary/{symbol}?hours=24
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<PriceSummary>> {
    query.validate().map_err(validation_error)?;
    let symbol = Ticker::parse(&symbol).map_err(api_error)?;

    state
        .store
        .summary_for(&symbol, chrono::Duration::hours(i64::from(query.hours)))
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| {
            reject(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} 데이터가 없습니다", symbol),
            )
        })
}

/// 티커 레지스트리 조회
///
/// GET /api/v1/prices/tickers
pub async fn get_tickers(State(state): State<Arc<AppState>>) -> ApiResult<Json<TickersResponse>> {
    let tickers = state.store.tickers().await.map_err(api_error)?;

    Ok(Json(TickersResponse {
        total: tickers.len(),
        tickers,
    }))
}

/// 종목 데이터 삭제
///
/// `confirm=true`가 없으면 400. 삭제할 레코드가 없으면 404.
/// DELETE /api/v1/prices/data/{symbol}?confirm=true
pub async fn delete_symbol_data(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    let symbol = Ticker::parse(&symbol).map_err(api_error)?;

    if !query.confirm {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "CONFIRMATION_REQUIRED",
            format!("{} 데이터 삭제는 confirm=true가 필요합니다", symbol),
        ));
    }

    let deleted_records = state.store.delete_all(&symbol).await.map_err(api_error)?;
    if deleted_records == 0 {
        return Err(reject(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{} 데이터가 없습니다", symbol),
        ));
    }

    if state.agent.status().await.tickers.contains(&symbol) {
        warn!(symbol = %symbol, "수집 중인 티커의 데이터 삭제 - 다음 사이클에 다시 등록됩니다");
    }
    info!(symbol = %symbol, deleted_records, "종목 데이터 삭제");

    Ok(Json(DeleteResponse {
        symbol,
        deleted_records,
    }))
}

pub fn prices_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/latest", get(get_latest))
        .route("/history/{symbol}", get(get_history))
        .route("/summary/{symbol}", get(get_summary))
        .route("/tickers", get(get_tickers))
        .route("/data/{symbol}", delete(delete_symbol_data))
}

// ==================== 테스트 ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    fn observation(symbol: &str, minutes_ago: i64, close: rust_decimal::Decimal) -> PriceObservation {
        PriceObservation::new(
            Ticker::parse(symbol).unwrap(),
            Utc::now() - chrono::Duration::minutes(minutes_ago),
            close,
            close,
            close,
            close,
            dec!(1000),
        )
        .unwrap()
    }

    async fn seeded_state() -> Arc<AppState> {
        let state = Arc::new(create_test_state());
        for (minutes_ago, close) in [(90, dec!(100)), (60, dec!(101)), (30, dec!(103))] {
            state
                .store
                .append(&observation("AAPL", minutes_ago, close))
                .await
                .unwrap();
        }
        state
            .store
            .append(&observation("MSFT", 10, dec!(400)))
            .await
            .unwrap();
        state
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
        let app = prices_router().with_state(state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_latest_filtered_and_all() {
        let state = seeded_state().await;

        let (status, body) = call(&state, "GET", "/latest?tickers=aapl").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["prices"][0]["symbol"], "AAPL");
        assert_eq!(body["prices"][0]["close"], "103");
        assert_eq!(body["prices"][0]["change_24h"], "3");

        let (_, body) = call(&state, "GET", "/latest").await;
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_history_is_ascending_and_limited() {
        let state = seeded_state().await;

        let (status, body) = call(&state, "GET", "/history/aapl?hours=24&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["close"], "101");
        assert_eq!(body["data"][1]["close"], "103");
    }

    #[tokio::test]
    async fn test_history_rejects_out_of_range_query() {
        let state = seeded_state().await;

        let (status, body) = call(&state, "GET", "/history/AAPL?hours=169").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = call(&state, "GET", "/history/AAPL?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&state, "GET", "/history/BAD%20TICKER!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_summary_found_and_missing() {
        let state = seeded_state().await;

        let (status, body) = call(&state, "GET", "/summary/AAPL?hours=24").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["window_records"], 3);
        assert_eq!(body["total_records"], 3);

        let (status, body) = call(&state, "GET", "/summary/TSLA").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let state = seeded_state().await;

        let (status, body) = call(&state, "DELETE", "/data/AAPL").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFIRMATION_REQUIRED");

        let (status, body) = call(&state, "DELETE", "/data/AAPL?confirm=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["deleted_records"], 3);

        let (status, _) = call(&state, "DELETE", "/data/AAPL?confirm=true").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&state, "GET", "/tickers").await;
        let aapl = body["tickers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["symbol"] == "AAPL")
            .cloned()
            .unwrap();
        assert_eq!(aapl["is_active"], false);
        assert_eq!(aapl["record_count"], 0);
    }
}
