//! 시세 관측치.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, PulseResult};
use crate::types::Ticker;

/// 한 종목의 특정 시점 OHLCV 관측치.
///
/// (symbol, observed_at) 쌍이 고유 키입니다. 생성 후에는 변경하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// 종목 코드
    pub symbol: Ticker,
    /// 관측 시각 (UTC)
    pub observed_at: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl PriceObservation {
    /// 값을 검증하며 관측치를 생성합니다.
    ///
    /// 음수 가격/거래량이나 고가 < 저가인 경우 `Malformed`를 반환합니다.
    pub fn new(
        symbol: Ticker,
        observed_at: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> PulseResult<Self> {
        let obs = Self {
            symbol,
            observed_at,
            open,
            high,
            low,
            close,
            volume,
        };
        obs.validate()?;
        Ok(obs)
    }

    fn validate(&self) -> PulseResult<()> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.is_sign_negative()) || self.volume.is_sign_negative() {
            return Err(PulseError::Malformed(format!(
                "{}: 음수 가격 또는 거래량",
                self.symbol
            )));
        }
        if self.high < self.low {
            return Err(PulseError::Malformed(format!(
                "{}: 고가({})가 저가({})보다 낮습니다",
                self.symbol, self.high, self.low
            )));
        }
        Ok(())
    }
}
