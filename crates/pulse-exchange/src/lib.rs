//! 시세 소스 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `QuoteSource` trait: 종목별 최신 시세 조회 인터페이스
//! - Yahoo Finance 소스
//! - 시뮬레이션 소스 (오프라인 실행 및 테스트용)
//! - 호출당 타임아웃 적용 헬퍼

pub mod error;
pub mod simulated;
pub mod source;
pub mod yahoo;

pub use error::*;
pub use simulated::SimulatedQuoteSource;
pub use source::{build_source, fetch_with_timeout, QuoteSource};
pub use yahoo::YahooQuoteSource;
