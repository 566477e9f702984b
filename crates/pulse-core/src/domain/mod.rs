//! 시세 수집을 위한 도메인 모델.

mod observation;
mod summary;

pub use observation::*;
pub use summary::*;
