//! # sp-model
//!
//! 列表与字段元数据的客户端数据访问层，核心是批量创建并挂接子实体。
//!
//! Client-side data-access layer for a remote list/field metadata model.
//!
//! ## Overview
//!
//! New child objects (such as the field links of a content type) are created
//! in memory by their parent's collection, queued as pending requests into a
//! [`batch::Batch`], and materialized remotely either immediately or as part of
//! a larger batch of unrelated operations executed later by the caller.
//!
//! - An entity is usable as soon as it is queued; its state tells whether the
//!   service has confirmed it yet.
//! - Requests sharing a batch execute in insertion order and report their
//!   outcomes in the same order.
//! - Each entity is materialized at most once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sp_model::model::FieldLinkOptions;
//! use sp_model::ClientContext;
//!
//! #[tokio::main]
//! async fn main() -> sp_model::Result<()> {
//!     let ctx = ClientContext::builder()
//!         .base_url("https://contoso.sharepoint.com/sites/dev")
//!         .build()?;
//!     let ct = ctx.content_type("0x0101");
//!
//!     let batch = ctx.new_batch();
//!     let title = ct.field_links().add_batch(&batch, "Title", FieldLinkOptions::new().hidden(true))?;
//!     let status = ct.field_links().add_batch(&batch, "Status", FieldLinkOptions::default())?;
//!     assert!(title.is_pending() && status.is_pending());
//!
//!     let result = ctx.execute(&batch).await?;
//!     assert!(result.all_succeeded());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | Entities, collections, field links, content types |
//! | [`batch`] | Batch accumulation, execution and results |
//! | [`context`] | Client context, configuration and builder |
//! | [`transport`] | HTTP batch executor |
//! | [`error_code`] | Remote failure classification |

pub mod batch;
pub mod context;
pub mod error_code;
pub mod model;
pub mod transport;

pub use batch::{Batch, BatchExecutor, BatchResult, CorrelationId, DuplicatePolicy};
pub use context::{ClientContext, ClientContextBuilder, ContextConfig};
pub use model::{
    ContentType, Entity, EntityState, FieldLink, FieldLinkCollection, FieldLinkOptions,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, RemoteFailure};
