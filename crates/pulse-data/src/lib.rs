//! 시세 관측치 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - `PriceStore` trait: 관측치 저장 및 조회 인터페이스
//! - PostgreSQL 저장소 (sqlx)
//! - 인메모리 저장소 (DB 없는 실행 및 테스트용)

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{DataError, Result};
pub use memory::MemoryPriceStore;
pub use postgres::PgPriceStore;
pub use store::{connect_store, AppendOutcome, PriceStore};
