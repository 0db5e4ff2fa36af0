//! 传输层：HTTP 批处理执行器与传输错误。
//!
//! Transport layer. Owns the wire round trip for a batch; the rest of the crate
//! only sees the [`BatchExecutor`](crate::batch::BatchExecutor) contract.

pub mod http;

pub use http::HttpBatchExecutor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}
