//! 티커 및 티커 집합 정의.
//!
//! - `Ticker` - 대소문자가 정규화된 단일 종목 코드
//! - `TickerSet` - 중복 없는 티커의 순서 있는 집합

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PulseError, PulseResult};

/// 티커 최대 길이.
pub const MAX_TICKER_LEN: usize = 12;

/// 정규화된 종목 코드 (예: AAPL, BRK.B, ^GSPC, EURUSD=X).
///
/// 앞뒤 공백을 제거하고 대문자로 변환합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// 원시 문자열을 정규화하여 티커를 생성합니다.
    pub fn parse(raw: &str) -> PulseResult<Self> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(PulseError::InvalidInput("빈 티커".to_string()));
        }
        if normalized.len() > MAX_TICKER_LEN {
            return Err(PulseError::InvalidInput(format!(
                "티커가 너무 깁니다 (최대 {}자): {}",
                MAX_TICKER_LEN, normalized
            )));
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(PulseError::InvalidInput(format!(
                "티커에 허용되지 않는 문자 '{}': {}",
                c, normalized
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = PulseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 중복 없는 티커 집합.
///
/// 처음 등장한 순서를 유지합니다. 내부는 `Arc`로 공유되어
/// 사이클 시작 시 스냅샷 복사가 저렴합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSet(Arc<[Ticker]>);

impl TickerSet {
    /// 원시 문자열 목록에서 티커 집합을 생성합니다.
    ///
    /// 공백뿐인 항목은 무시하고 중복은 하나로 합칩니다.
    /// 결과가 비어 있으면 `InvalidInput`을 반환합니다.
    pub fn parse<I, S>(raw: I) -> PulseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tickers: Vec<Ticker> = Vec::new();
        for item in raw {
            let item = item.as_ref();
            if item.trim().is_empty() {
                continue;
            }
            let ticker = Ticker::parse(item)?;
            if !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }

        if tickers.is_empty() {
            return Err(PulseError::InvalidInput(
                "티커 목록이 비어 있습니다".to_string(),
            ));
        }

        Ok(Self(tickers.into()))
    }

    /// 쉼표로 구분된 문자열에서 티커 집합을 생성합니다 (예: "AAPL,msft").
    pub fn parse_csv(raw: &str) -> PulseResult<Self> {
        Self::parse(raw.split(','))
    }

    /// 빈 집합.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.0.contains(ticker)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ticker> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Ticker] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TickerSet {
    type Item = &'a Ticker;
    type IntoIter = std::slice::Iter<'a, Ticker>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Default for TickerSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for TickerSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for TickerSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        TickerSet::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for TickerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(Ticker::as_str).collect();
        f.write_str(&joined.join(","))
    }
}
