//! PostgreSQL 저장소.
//!
//! `prices`는 (symbol, ts) 고유 제약을 가지며, 추가는 `ON CONFLICT ... DO UPDATE`
//! upsert로 처리하여 동시 쓰기(정기/강제 수집)에도 중복 키 에러가 나지 않습니다.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pulse_core::{
    DatabaseConfig, LatestPrice, PriceObservation, PriceSummary, Ticker, TickerInfo, TickerSet,
    TimeRange,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument};

use crate::error::{DataError, Result};
use crate::store::{AppendOutcome, PriceStore};

/// 시세 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct PriceRecord {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PriceRecord {
    /// 도메인 관측치로 변환.
    pub fn into_observation(self) -> Result<PriceObservation> {
        let symbol = Ticker::parse(&self.symbol)
            .map_err(|e| DataError::InvalidData(format!("저장된 심볼 '{}': {}", self.symbol, e)))?;
        Ok(PriceObservation {
            symbol,
            observed_at: self.ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

#[derive(Debug, FromRow)]
struct TickerRow {
    symbol: String,
    is_active: bool,
    record_count: i64,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct TotalsRow {
    total_records: i64,
    first_recorded: Option<DateTime<Utc>>,
}

const PRICE_COLUMNS: &str = "symbol, ts, open, high, low, close, volume";

/// PostgreSQL 시세 저장소.
#[derive(Clone)]
pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    /// 새로운 연결 풀을 생성합니다.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        info!("데이터베이스 연결 중...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(StdDuration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("데이터베이스 연결 완료");
        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 스키마 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("데이터베이스 마이그레이션 실행...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("데이터베이스 마이그레이션 완료");
        Ok(())
    }

    async fn fetch_latest_rows(&self, symbols: Option<&[String]>) -> Result<Vec<PriceRecord>> {
        let rows = match symbols {
            Some(symbols) => {
                sqlx::query_as::<_, PriceRecord>(&format!(
                    r#"
                    SELECT DISTINCT ON (symbol) {PRICE_COLUMNS}
                    FROM prices
                    WHERE symbol = ANY($1)
                    ORDER BY symbol, ts DESC
                    "#
                ))
                .bind(symbols)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PriceRecord>(
                    r#"
                    SELECT DISTINCT ON (p.symbol)
                        p.symbol, p.ts, p.open, p.high, p.low, p.close, p.volume
                    FROM prices p
                    JOIN tickers t ON t.symbol = p.symbol
                    WHERE t.is_active
                    ORDER BY p.symbol, p.ts DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn fetch_earliest_since(
        &self,
        symbols: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query_as::<_, PriceRecord>(&format!(
            r#"
            SELECT DISTINCT ON (symbol) {PRICE_COLUMNS}
            FROM prices
            WHERE symbol = ANY($1) AND ts >= $2
            ORDER BY symbol, ts ASC
            "#
        ))
        .bind(symbols)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, observation), fields(symbol = %observation.symbol))]
    async fn append(&self, observation: &PriceObservation) -> Result<AppendOutcome> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            WITH registered AS (
                INSERT INTO tickers (symbol) VALUES ($1)
                ON CONFLICT (symbol) DO UPDATE SET is_active = TRUE, updated_at = NOW()
                WHERE tickers.is_active = FALSE
            )
            INSERT INTO prices (symbol, ts, open, high, low, close, volume)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (symbol, ts) DO UPDATE SET
                open = EXCLUDED.open,
                high = EXCLUDED.high,
                low = EXCLUDED.low,
                close = EXCLUDED.close,
                volume = EXCLUDED.volume,
                created_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(observation.symbol.as_str())
        .bind(observation.observed_at)
        .bind(observation.open)
        .bind(observation.high)
        .bind(observation.low)
        .bind(observation.close)
        .bind(observation.volume)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DataError::from(e) {
            DataError::QueryError(msg) => DataError::InsertError(msg),
            other => other,
        })?;

        debug!(inserted, "관측치 저장");

        Ok(if inserted {
            AppendOutcome::Inserted
        } else {
            AppendOutcome::Replaced
        })
    }

    async fn latest_for(&self, symbols: Option<&TickerSet>) -> Result<Vec<LatestPrice>> {
        let filter: Option<Vec<String>> =
            symbols.map(|set| set.iter().map(|t| t.as_str().to_string()).collect());

        let latest = self.fetch_latest_rows(filter.as_deref()).await?;
        if latest.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<String> = latest.iter().map(|r| r.symbol.clone()).collect();
        let since = Utc::now() - Duration::hours(24);
        let mut references: std::collections::HashMap<String, PriceObservation> = self
            .fetch_earliest_since(&found, since)
            .await?
            .into_iter()
            .map(|r| Ok((r.symbol.clone(), r.into_observation()?)))
            .collect::<Result<_>>()?;

        latest
            .into_iter()
            .map(|record| {
                let reference = references.remove(&record.symbol);
                let observation = record.into_observation()?;
                Ok(LatestPrice::new(observation, reference.as_ref()))
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn history_for(
        &self,
        symbol: &Ticker,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query_as::<_, PriceRecord>(&format!(
            r#"
            SELECT {PRICE_COLUMNS} FROM (
                SELECT {PRICE_COLUMNS}
                FROM prices
                WHERE symbol = $1 AND ts >= $2 AND ts <= $3
                ORDER BY ts DESC
                LIMIT $4
            ) recent
            ORDER BY ts ASC
            "#
        ))
        .bind(symbol.as_str())
        .bind(range.start)
        .bind(range.end)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PriceRecord::into_observation).collect()
    }

    #[instrument(skip(self))]
    async fn summary_for(
        &self,
        symbol: &Ticker,
        window: Duration,
    ) -> Result<Option<PriceSummary>> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COUNT(*) AS total_records, MIN(ts) AS first_recorded
            FROM prices
            WHERE symbol = $1
            "#,
        )
        .bind(symbol.as_str())
        .fetch_one(&self.pool)
        .await?;

        let (total_records, Some(first_recorded)) = (totals.total_records, totals.first_recorded)
        else {
            return Ok(None);
        };

        let latest = sqlx::query_as::<_, PriceRecord>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices WHERE symbol = $1 ORDER BY ts DESC LIMIT 1"
        ))
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(latest) = latest else {
            return Ok(None);
        };
        let latest = latest.into_observation()?;

        let window_rows = sqlx::query_as::<_, PriceRecord>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices WHERE symbol = $1 AND ts >= $2 ORDER BY ts ASC"
        ))
        .bind(symbol.as_str())
        .bind(Utc::now() - window)
        .fetch_all(&self.pool)
        .await?;
        let in_window = window_rows
            .into_iter()
            .map(PriceRecord::into_observation)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(PriceSummary::build(
            &latest,
            &in_window,
            window,
            first_recorded,
            total_records.max(0) as u64,
        )))
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, symbol: &Ticker) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM prices WHERE symbol = $1")
            .bind(symbol.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DataError::DeleteError(e.to_string()))?;

        sqlx::query("UPDATE tickers SET is_active = FALSE, updated_at = NOW() WHERE symbol = $1")
            .bind(symbol.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DataError::DeleteError(e.to_string()))?;

        tx.commit().await?;

        info!(symbol = %symbol, deleted = result.rows_affected(), "시세 데이터 삭제");
        Ok(result.rows_affected())
    }

    async fn tickers(&self) -> Result<Vec<TickerInfo>> {
        let rows = sqlx::query_as::<_, TickerRow>(
            r#"
            SELECT t.symbol, t.is_active,
                   COUNT(p.id) AS record_count,
                   MAX(p.ts) AS last_update
            FROM tickers t
            LEFT JOIN prices p ON p.symbol = t.symbol
            GROUP BY t.symbol, t.is_active
            ORDER BY t.symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TickerInfo {
                    symbol: Ticker::parse(&row.symbol)
                        .map_err(|e| DataError::InvalidData(e.to_string()))?,
                    is_active: row.is_active,
                    record_count: row.record_count.max(0) as u64,
                    last_update: row.last_update,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        Ok(())
    }
}
