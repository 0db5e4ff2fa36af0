//! 数据模型：实体、集合及其类型化的实体种类。
//!
//! In-memory model of remote objects.
//!
//! An [`Entity`] is created by its parent's [`Collection`], filled in locally,
//! and materialized remotely through a [`Batch`](crate::batch::Batch). The kind
//! of object is a type parameter implementing [`EntityKind`], so collections
//! hand out strongly-typed entities without runtime type inspection.

pub mod collection;
pub mod content_type;
pub mod entity;
pub mod field_link;

pub use collection::Collection;
pub use content_type::ContentType;
pub use entity::{Entity, EntityId, EntityState};
pub use field_link::{FieldLink, FieldLinkCollection, FieldLinkOptions, FieldLinkProperties};

use crate::Result;
use serde::Serialize;
use std::fmt;

/// Marker for one kind of remote object.
pub trait EntityKind: Send + Sync + 'static {
    /// Property mapping of the object.
    type Properties: Clone + Default + Serialize + fmt::Debug + Send + Sync;

    /// Remote type name (e.g. `SP.FieldLink`).
    const ENTITY_TYPE: &'static str;

    /// Path segment of the collection below its parent (e.g. `FieldLinks`).
    const COLLECTION_SEGMENT: &'static str;

    /// Identity of the object within its parent, used to detect duplicate pending requests.
    fn key(properties: &Self::Properties) -> Option<&str>;

    /// Local precondition check, run before anything is allocated or queued.
    fn validate(properties: &Self::Properties) -> Result<()>;
}

/// Back-reference from a collection to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub entity_type: String,
    /// Resource path relative to the site url, without trailing slash.
    pub path: String,
}

impl ParentRef {
    pub fn new(entity_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            path: path.into().trim_end_matches('/').to_string(),
        }
    }

    /// Path of a child collection below this parent.
    pub fn child_path(&self, segment: &str) -> String {
        format!("{}/{}", self.path, segment)
    }
}
