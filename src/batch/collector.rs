//! Batch collector.

use crate::model::entity::{BatchTarget, EntityId};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-batch request identifier, assigned in enqueue order starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to do when a second uncommitted request for the same object is queued
/// into a batch that still holds the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse the second request with `InvalidState`.
    #[default]
    Reject,
    /// Queue both; the remote service decides.
    Allow,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "allow" => Ok(Self::Allow),
            other => Err(Error::configuration(
                format!("unknown duplicate policy '{}'", other),
                ErrorContext::new()
                    .with_field_path("duplicate_policy")
                    .with_details("expected 'reject' or 'allow'"),
            )),
        }
    }
}

/// One pending mutation request.
///
/// The correlation id is assigned by [`Batch::enqueue`]; whatever value the
/// request carries before that is overwritten.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub correlation_id: CorrelationId,
    pub method: String,
    /// Path relative to the site url (e.g. `_api/web/contenttypes('0x0101')/FieldLinks`).
    pub path: String,
    /// Remote type name of the object this request materializes.
    pub entity_type: &'static str,
    /// Identity key of the object within its parent (e.g. a field internal name).
    pub key: Option<String>,
    pub body: serde_json::Value,
    pub(crate) entity_id: Option<EntityId>,
    pub(crate) target: Option<Weak<dyn BatchTarget>>,
}

impl BatchRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        entity_type: &'static str,
        body: serde_json::Value,
    ) -> Self {
        Self {
            correlation_id: CorrelationId(0),
            method: method.into(),
            path: path.into(),
            entity_type,
            key: None,
            body,
            entity_id: None,
            target: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn with_target(mut self, id: EntityId, target: Weak<dyn BatchTarget>) -> Self {
        self.entity_id = Some(id);
        self.target = Some(target);
        self
    }

    /// Client-side id of the entity this request materializes, if any.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.entity_id
    }

    fn same_object(&self, other: &BatchRequest) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => {
                a == b && self.entity_type == other.entity_type && self.path == other.path
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
struct BatchState {
    next_id: u64,
    requests: VecDeque<BatchRequest>,
}

struct BatchInner {
    id: Uuid,
    policy: DuplicatePolicy,
    state: Mutex<BatchState>,
    executing: AtomicBool,
}

/// Ordered accumulator of pending mutation requests, executed as a unit.
///
/// `Batch` is a handle: clones share the same queue. Enqueueing is safe from
/// concurrent call chains; the resulting order is the order in which the
/// enqueue calls acquired the queue.
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl Batch {
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                id: Uuid::new_v4(),
                policy,
                state: Mutex::new(BatchState {
                    next_id: 1,
                    requests: VecDeque::new(),
                }),
                executing: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.inner.policy
    }

    /// Whether both handles refer to the same batch.
    pub fn same_batch(&self, other: &Batch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request at the tail and return its correlation id.
    ///
    /// Under [`DuplicatePolicy::Reject`] a request for an object that already
    /// has one queued is refused with `InvalidState` and the queue is unchanged.
    pub fn enqueue(&self, mut request: BatchRequest) -> Result<CorrelationId> {
        let mut state = self.state();

        if self.inner.policy == DuplicatePolicy::Reject {
            if let Some(existing) = state.requests.iter().find(|r| r.same_object(&request)) {
                warn!(
                    batch_id = %self.inner.id,
                    entity_type = request.entity_type,
                    key = request.key.as_deref().unwrap_or_default(),
                    existing = %existing.correlation_id,
                    "rejecting duplicate pending request"
                );
                return Err(Error::invalid_state(
                    format!(
                        "a pending {} request for '{}' is already queued in this batch",
                        request.entity_type,
                        request.key.as_deref().unwrap_or_default()
                    ),
                    ErrorContext::new()
                        .with_details(format!("existing request {}", existing.correlation_id))
                        .with_source("batch"),
                ));
            }
        }

        let id = CorrelationId(state.next_id);
        state.next_id += 1;
        request.correlation_id = id;
        debug!(
            batch_id = %self.inner.id,
            correlation_id = %id,
            method = %request.method,
            path = %request.path,
            "request enqueued"
        );
        state.requests.push_back(request);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.state().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued requests in execution order.
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.state().requests.iter().cloned().collect()
    }

    pub fn correlation_ids(&self) -> Vec<CorrelationId> {
        self.state()
            .requests
            .iter()
            .map(|r| r.correlation_id)
            .collect()
    }

    pub fn is_executing(&self) -> bool {
        self.inner.executing.load(Ordering::Acquire)
    }

    /// Claim the batch for one execution. Released when the guard drops,
    /// including when the execution future is dropped mid-flight.
    pub(crate) fn begin_execution(&self) -> Result<ExecutionGuard<'_>> {
        self.inner
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                Error::invalid_state(
                    "batch is already executing",
                    ErrorContext::new()
                        .with_details(format!("batch {}", self.inner.id))
                        .with_source("batch"),
                )
            })?;
        Ok(ExecutionGuard { batch: self })
    }

    /// Drop executed requests. Requests queued after the snapshot stay.
    pub(crate) fn complete(&self, executed: &[CorrelationId]) {
        let mut state = self.state();
        state
            .requests
            .retain(|r| !executed.contains(&r.correlation_id));
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.inner.id)
            .field("policy", &self.inner.policy)
            .field("pending", &self.len())
            .field("executing", &self.is_executing())
            .finish()
    }
}

pub(crate) struct ExecutionGuard<'a> {
    batch: &'a Batch,
}

impl ExecutionGuard<'_> {
    pub(crate) fn snapshot(&self) -> Vec<BatchRequest> {
        self.batch.requests()
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.batch.inner.executing.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(key: &str) -> BatchRequest {
        BatchRequest::new("POST", "_api/web/contenttypes('0x01')/FieldLinks", "SP.FieldLink", json!({}))
            .with_key(key)
    }

    #[test]
    fn correlation_ids_follow_enqueue_order() {
        let batch = Batch::new();
        let a = batch.enqueue(link("Title")).unwrap();
        let b = batch.enqueue(link("Status")).unwrap();
        assert_eq!(a, CorrelationId::new(1));
        assert_eq!(b, CorrelationId::new(2));
        assert_eq!(batch.correlation_ids(), vec![a, b]);
        assert_eq!(batch.requests()[1].key.as_deref(), Some("Status"));
    }

    #[test]
    fn duplicate_rejected_by_default() {
        let batch = Batch::new();
        batch.enqueue(link("Title")).unwrap();
        let err = batch.enqueue(link("Title")).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn duplicate_allowed_when_configured() {
        let batch = Batch::with_policy(DuplicatePolicy::Allow);
        batch.enqueue(link("Title")).unwrap();
        batch.enqueue(link("Title")).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn same_key_under_different_parent_is_not_a_duplicate() {
        let batch = Batch::new();
        batch.enqueue(link("Title")).unwrap();
        let other = BatchRequest::new(
            "POST",
            "_api/web/contenttypes('0x0120')/FieldLinks",
            "SP.FieldLink",
            json!({}),
        )
        .with_key("Title");
        batch.enqueue(other).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn unkeyed_requests_never_collide() {
        let batch = Batch::new();
        let req = BatchRequest::new("POST", "_api/web/lists", "SP.List", json!({}));
        batch.enqueue(req.clone()).unwrap();
        batch.enqueue(req).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn execution_guard_is_exclusive_and_released_on_drop() {
        let batch = Batch::new();
        let guard = batch.begin_execution().unwrap();
        assert!(batch.is_executing());
        assert!(matches!(
            batch.begin_execution(),
            Err(Error::InvalidState { .. })
        ));
        drop(guard);
        assert!(!batch.is_executing());
        assert!(batch.begin_execution().is_ok());
    }

    #[test]
    fn complete_keeps_requests_queued_after_snapshot() {
        let batch = Batch::new();
        let first = batch.enqueue(link("Title")).unwrap();
        let late = batch.enqueue(link("Status")).unwrap();
        batch.complete(&[first]);
        assert_eq!(batch.correlation_ids(), vec![late]);
        // Ids keep increasing after draining.
        assert_eq!(batch.enqueue(link("Title")).unwrap(), CorrelationId::new(3));
    }

    #[test]
    fn duplicate_policy_parses() {
        assert_eq!("Allow".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Allow);
        assert_eq!(" reject ".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
        assert!("maybe".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn concurrent_enqueue_assigns_unique_ids() {
        use std::thread;

        let batch = Batch::with_policy(DuplicatePolicy::Allow);
        let mut handles = vec![];
        for i in 0..10 {
            let b = batch.clone();
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    b.enqueue(link(&format!("f{}", i * 10 + j))).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let ids: Vec<u64> = batch.correlation_ids().iter().map(|c| c.value()).collect();
        assert_eq!(ids, (1..=100).collect::<Vec<_>>());
    }
}
