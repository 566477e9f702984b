//! # Pulse Core
//!
//! MarketPulse 시세 수집 시스템의 핵심 도메인 타입을 제공합니다.
//!
//! - 티커 및 티커 집합 (대소문자 정규화)
//! - 시세 관측치, 최신가, 요약 통계
//! - 에러 분류 체계
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
