//! 批处理模块：收集待执行的变更请求，并作为一个整体执行。
//!
//! # Batched Mutation Module
//!
//! A [`Batch`] accumulates pending mutation requests from any number of
//! collections, in insertion order, and is executed as a unit by a
//! [`BatchExecutor`]. Each request carries a [`CorrelationId`] that maps the
//! executor's per-request outcome back to the entity it materializes.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Batch`] | Shared, ordered queue of pending requests |
//! | [`BatchRequest`] | One pending request with its correlation id |
//! | [`BatchExecutor`] | Round-trip contract implemented by the transport |
//! | [`execute_batch`] | Drives one execution and applies outcomes to entities |
//! | [`BatchResult`] | Per-request outcomes in insertion order |
//! | [`InMemoryBatchExecutor`] | Executor without network, for tests |
//!
//! ## Example
//!
//! ```rust
//! use sp_model::batch::{execute_batch, Batch, BatchRequest, InMemoryBatchExecutor};
//!
//! # tokio_test_block_on(async {
//! let batch = Batch::new();
//! batch.enqueue(BatchRequest::new("POST", "_api/web/lists", "SP.List", serde_json::json!({})))?;
//! batch.enqueue(BatchRequest::new("POST", "_api/web/lists", "SP.List", serde_json::json!({})))?;
//!
//! let executor = InMemoryBatchExecutor::new();
//! let result = execute_batch(&batch, &executor, None).await?;
//! assert_eq!(result.success_count(), 2);
//! assert!(batch.is_empty());
//! # Ok::<(), sp_model::Error>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Semantics
//!
//! - Requests execute in insertion order; results are reported in the same order.
//! - One request's failure never hides or blocks its siblings' outcomes.
//! - An executed request is removed and never executed again.
//! - A cancelled execution removes nothing; the batch can simply be executed again.

mod collector;
mod executor;
mod memory;

pub use collector::{Batch, BatchRequest, CorrelationId, DuplicatePolicy};
pub use executor::{
    execute_batch, BatchExecutor, BatchResult, RequestOutcome, RequestResult,
};
pub use memory::InMemoryBatchExecutor;
