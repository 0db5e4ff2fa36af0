//! Entity handle and its lifecycle.

use super::EntityKind;
use crate::batch::CorrelationId;
use crate::error::RemoteFailure;
use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::debug;
use uuid::Uuid;

/// Client-side identity, assigned when the entity is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(Uuid);

impl EntityId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of an entity.
///
/// ```text
/// Uninitialized --add--> Pending --success--> Committed
///       |                   `----failure--> Failed
///       `--rejected--> Removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    Uninitialized,
    Pending,
    Committed,
    Failed,
    Removed,
}

impl EntityState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed | Self::Removed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Failed => "failed",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: EntityState,
    batch_id: Option<Uuid>,
    correlation_id: Option<CorrelationId>,
    remote_id: Option<String>,
    failure: Option<RemoteFailure>,
}

/// Receiver of a batch outcome. Returns `false` when the entity was not
/// `Pending` and the outcome was not applied.
pub(crate) trait BatchTarget: Send + Sync {
    fn commit(&self, remote_id: String) -> bool;
    fn fail(&self, failure: RemoteFailure) -> bool;
}

pub(crate) struct EntityCell<K: EntityKind> {
    id: EntityId,
    properties: RwLock<K::Properties>,
    lifecycle: Mutex<Lifecycle>,
}

impl<K: EntityKind> EntityCell<K> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: std::result::Result<String, RemoteFailure>) -> bool {
        let mut lc = self.lifecycle();
        if lc.state != EntityState::Pending {
            return false;
        }
        match outcome {
            Ok(remote_id) => {
                debug!(entity_id = %self.id, entity_type = K::ENTITY_TYPE, remote_id = %remote_id, "entity committed");
                lc.state = EntityState::Committed;
                lc.remote_id = Some(remote_id);
            }
            Err(failure) => {
                debug!(entity_id = %self.id, entity_type = K::ENTITY_TYPE, failure = %failure, "entity failed");
                lc.state = EntityState::Failed;
                lc.failure = Some(failure);
            }
        }
        true
    }
}

impl<K: EntityKind> BatchTarget for EntityCell<K> {
    fn commit(&self, remote_id: String) -> bool {
        self.settle(Ok(remote_id))
    }

    fn fail(&self, failure: RemoteFailure) -> bool {
        self.settle(Err(failure))
    }
}

/// Shared handle to one in-memory entity.
///
/// Clones refer to the same entity; the owning collection holds one handle and
/// callers hold others.
pub struct Entity<K: EntityKind> {
    cell: Arc<EntityCell<K>>,
}

impl<K: EntityKind> Clone for Entity<K> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<K: EntityKind> Entity<K> {
    pub(crate) fn allocate() -> Self {
        Self::allocate_with(K::Properties::default())
    }

    pub(crate) fn allocate_with(properties: K::Properties) -> Self {
        Self {
            cell: Arc::new(EntityCell {
                id: EntityId::new(),
                properties: RwLock::new(properties),
                lifecycle: Mutex::new(Lifecycle {
                    state: EntityState::Uninitialized,
                    batch_id: None,
                    correlation_id: None,
                    remote_id: None,
                    failure: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id
    }

    pub fn entity_type(&self) -> &'static str {
        K::ENTITY_TYPE
    }

    pub fn state(&self) -> EntityState {
        self.cell.lifecycle().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == EntityState::Pending
    }

    pub fn is_committed(&self) -> bool {
        self.state() == EntityState::Committed
    }

    pub fn is_failed(&self) -> bool {
        self.state() == EntityState::Failed
    }

    /// Server-issued identity, set once committed.
    pub fn remote_id(&self) -> Option<String> {
        self.cell.lifecycle().remote_id.clone()
    }

    /// The failure that moved this entity to `Failed`.
    pub fn failure(&self) -> Option<RemoteFailure> {
        self.cell.lifecycle().failure.clone()
    }

    /// Correlation id of the pending request, once queued.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.cell.lifecycle().correlation_id
    }

    /// Id of the batch the entity was queued into.
    pub fn batch_id(&self) -> Option<Uuid> {
        self.cell.lifecycle().batch_id
    }

    /// Snapshot of the property mapping.
    pub fn properties(&self) -> K::Properties {
        self.cell
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read one value out of the property mapping.
    pub fn with_properties<R>(&self, f: impl FnOnce(&K::Properties) -> R) -> R {
        let props = self
            .cell
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&props)
    }

    /// Mutate the property mapping. Only allowed before the add request is queued.
    ///
    /// Crate-private: outside callers mutate through the typed setters of each
    /// kind, which enforce per-property rules such as an immutable key.
    ///
    /// ```compile_fail
    /// # fn demo(link: sp_model::Entity<sp_model::FieldLink>) {
    /// link.update(|p| p.field_internal_name = "Other".into());
    /// # }
    /// ```
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut K::Properties) -> R) -> Result<R> {
        // Held across the mutation so the entity cannot go pending halfway.
        let lc = self.cell.lifecycle();
        if lc.state != EntityState::Uninitialized {
            return Err(self.not_uninitialized(&lc, "modify"));
        }
        let mut props = self
            .cell
            .properties
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut props))
    }

    fn not_uninitialized(&self, lc: &Lifecycle, action: &str) -> Error {
        Error::invalid_state(
            format!("cannot {} {} after it was queued", action, K::ENTITY_TYPE),
            ErrorContext::new()
                .with_details(format!("entity {} is {}", self.cell.id, lc.state))
                .with_source("entity"),
        )
    }

    /// Move from `Uninitialized` to `Pending` through `queue`.
    ///
    /// `queue` sees the current properties and returns the batch and
    /// correlation id the request was recorded under. The lifecycle stays
    /// locked throughout, so two callers cannot queue the same entity and an
    /// outcome arriving from a concurrent execution waits until the entity is
    /// `Pending`. On error the entity is left `Uninitialized`.
    pub(crate) fn queue_with<F>(&self, queue: F) -> Result<CorrelationId>
    where
        F: FnOnce(&K::Properties) -> Result<(Uuid, CorrelationId)>,
    {
        let mut lc = self.cell.lifecycle();
        if lc.state != EntityState::Uninitialized {
            return Err(self.not_uninitialized(&lc, "queue"));
        }
        let (batch_id, correlation_id) = {
            let props = self
                .cell
                .properties
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            queue(&props)?
        };
        lc.state = EntityState::Pending;
        lc.batch_id = Some(batch_id);
        lc.correlation_id = Some(correlation_id);
        debug!(
            entity_id = %self.cell.id,
            entity_type = K::ENTITY_TYPE,
            batch_id = %batch_id,
            correlation_id = %correlation_id,
            "entity pending"
        );
        Ok(correlation_id)
    }

    /// Returns `false` when the entity had already left `Uninitialized`.
    pub(crate) fn mark_removed(&self) -> bool {
        let mut lc = self.cell.lifecycle();
        if lc.state != EntityState::Uninitialized {
            return false;
        }
        lc.state = EntityState::Removed;
        true
    }

    pub(crate) fn as_target(&self) -> Weak<dyn BatchTarget> {
        let weak: Weak<EntityCell<K>> = Arc::downgrade(&self.cell);
        weak
    }

    /// Whether both handles refer to the same entity.
    pub fn ptr_eq(&self, other: &Entity<K>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<K: EntityKind> fmt::Debug for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.cell.id)
            .field("entity_type", &K::ENTITY_TYPE)
            .field("state", &self.state())
            .field("properties", &self.properties())
            .finish()
    }
}
