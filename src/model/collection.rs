//! Ordered collection of entities owned by one parent object.

use super::entity::{Entity, EntityState};
use super::{EntityKind, ParentRef};
use crate::batch::{Batch, BatchRequest, CorrelationId};
use crate::context::ClientContext;
use crate::{Error, ErrorContext, Result};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Insertion-ordered container of `Entity<K>` belonging to one parent.
///
/// All add paths go through [`Collection::enqueue`]; the immediate path is
/// "enqueue into a fresh single-use batch, then execute it".
pub struct Collection<K: EntityKind> {
    parent: ParentRef,
    context: ClientContext,
    items: RwLock<Vec<Entity<K>>>,
}

impl<K: EntityKind> Collection<K> {
    pub fn new(parent: ParentRef, context: ClientContext) -> Self {
        Self {
            parent,
            context,
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> &ParentRef {
        &self.parent
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Resource path of this collection.
    pub fn path(&self) -> String {
        self.parent.child_path(K::COLLECTION_SEGMENT)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entity<K>>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entity<K>>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an `Uninitialized` entity and append it at the tail. No network.
    pub fn create_new_and_add(&self) -> Entity<K> {
        let entity = Entity::allocate();
        self.write().push(entity.clone());
        entity
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Entity<K>> {
        self.read().get(index).cloned()
    }

    /// Handles to every entity, in insertion order.
    pub fn entities(&self) -> Vec<Entity<K>> {
        self.read().clone()
    }

    pub fn position(&self, entity: &Entity<K>) -> Option<usize> {
        self.read().iter().position(|e| e.ptr_eq(entity))
    }

    /// First entity whose key matches.
    pub fn find(&self, key: &str) -> Option<Entity<K>> {
        self.read()
            .iter()
            .find(|e| e.with_properties(|p| K::key(p) == Some(key)))
            .cloned()
    }

    /// Entities currently in `state`.
    pub fn in_state(&self, state: EntityState) -> Vec<Entity<K>> {
        self.read()
            .iter()
            .filter(|e| e.state() == state)
            .cloned()
            .collect()
    }

    /// Drop failed entities from the collection and return them.
    pub fn remove_failed(&self) -> Vec<Entity<K>> {
        let mut items = self.write();
        let (failed, kept): (Vec<_>, Vec<_>) = items
            .drain(..)
            .partition(|e| e.state() == EntityState::Failed);
        *items = kept;
        failed
    }

    fn rollback(&self, entity: &Entity<K>) {
        if !entity.mark_removed() {
            return;
        }
        self.write().retain(|e| !e.ptr_eq(entity));
        warn!(
            entity_id = %entity.id(),
            entity_type = K::ENTITY_TYPE,
            "entity rolled back"
        );
    }

    fn add_request(&self, entity: &Entity<K>, properties: &K::Properties) -> Result<BatchRequest> {
        let body = serde_json::to_value(properties)?;
        let mut request = BatchRequest::new("POST", self.path(), K::ENTITY_TYPE, body)
            .with_target(entity.id(), entity.as_target());
        request.key = K::key(properties).map(str::to_string);
        Ok(request)
    }

    /// Validate, allocate and append. Nothing is allocated when validation fails.
    fn insert_new(&self, properties: K::Properties) -> Result<Entity<K>> {
        K::validate(&properties)?;
        let entity = Entity::allocate_with(properties);
        self.write().push(entity.clone());
        Ok(entity)
    }

    /// Queue the add request of an `Uninitialized` entity of this collection
    /// into `batch`.
    ///
    /// The entity's current properties are validated first. An entity that
    /// fails validation or is refused by the batch is rolled back: it leaves
    /// the collection and becomes `Removed`. An entity of another collection or
    /// one that is already queued is refused with `InvalidState` and left
    /// untouched. No network call is made.
    pub fn enqueue(&self, batch: &Batch, entity: &Entity<K>) -> Result<CorrelationId> {
        if self.position(entity).is_none() {
            return Err(Error::invalid_state(
                format!("{} does not belong to this collection", K::ENTITY_TYPE),
                ErrorContext::new()
                    .with_details(format!("entity {} not in {}", entity.id(), self.path()))
                    .with_source("collection"),
            ));
        }

        let queued = entity.queue_with(|properties| {
            K::validate(properties)?;
            let request = self.add_request(entity, properties)?;
            let correlation_id = batch.enqueue(request)?;
            Ok((batch.id(), correlation_id))
        });
        if queued.is_err() {
            self.rollback(entity);
        }
        queued
    }

    /// Same as [`enqueue`](Self::enqueue) against the context's current batch.
    pub fn enqueue_current(&self, entity: &Entity<K>) -> Result<CorrelationId> {
        let batch = self.context.current_batch();
        self.enqueue(&batch, entity)
    }

    /// Create an entity from `properties` and queue its add request into `batch`.
    ///
    /// Validation runs before anything is allocated. If the batch refuses the
    /// request the entity is rolled back, so a failed call leaves the collection
    /// and the batch unchanged. No network call is made.
    pub fn enqueue_new(&self, batch: &Batch, properties: K::Properties) -> Result<Entity<K>> {
        let entity = self.insert_new(properties)?;
        self.enqueue(batch, &entity)?;
        Ok(entity)
    }

    /// Same as [`enqueue_new`](Self::enqueue_new) against the context's current batch.
    pub fn enqueue_new_current(&self, properties: K::Properties) -> Result<Entity<K>> {
        let batch = self.context.current_batch();
        self.enqueue_new(&batch, properties)
    }

    /// Materialize an `Uninitialized` entity of this collection right away.
    ///
    /// Queues it into a fresh single-use batch and suspends until that batch
    /// has round-tripped. On a remote failure the entity stays in the
    /// collection as `Failed` and the error is returned.
    pub async fn add_entity(&self, entity: &Entity<K>) -> Result<()> {
        let batch = self.context.new_batch();
        let correlation_id = self.enqueue(&batch, entity)?;

        let result = self.context.execute(&batch).await?;
        match result.get(correlation_id) {
            Some(entry) => entry.clone().into_result().map(|_| ()),
            None => Err(Error::invalid_state(
                "batch execution reported no result for the request",
                ErrorContext::new()
                    .with_details(format!("request {} of batch {}", correlation_id, batch.id()))
                    .with_source("collection"),
            )),
        }
    }

    /// Create an entity and materialize it right away.
    pub async fn add_new(&self, properties: K::Properties) -> Result<Entity<K>> {
        let entity = self.insert_new(properties)?;
        self.add_entity(&entity).await?;
        Ok(entity)
    }
}

impl<K: EntityKind> std::fmt::Debug for Collection<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("parent", &self.parent)
            .field("entity_type", &K::ENTITY_TYPE)
            .field("len", &self.len())
            .finish()
    }
}
