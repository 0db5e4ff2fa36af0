use super::config::ContextConfig;
use crate::batch::{execute_batch, Batch, BatchExecutor, BatchResult};
use crate::model::ContentType;
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

struct ContextInner {
    config: ContextConfig,
    executor: Arc<dyn BatchExecutor>,
    current: Mutex<Batch>,
}

/// Connection state plus the "current" batch shared by implicit-batch calls.
///
/// Cheap to clone; clones share the executor and the current batch. Every
/// batch-taking operation also has an explicit-batch form, so the current
/// batch is only a convenience.
#[derive(Clone)]
pub struct ClientContext {
    inner: Arc<ContextInner>,
}

impl ClientContext {
    pub fn builder() -> super::builder::ClientContextBuilder {
        super::builder::ClientContextBuilder::new()
    }

    pub(crate) fn from_parts(config: ContextConfig, executor: Arc<dyn BatchExecutor>) -> Self {
        let current = Batch::with_policy(config.duplicate_policy);
        Self {
            inner: Arc::new(ContextInner {
                config,
                executor,
                current: Mutex::new(current),
            }),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn executor(&self) -> &Arc<dyn BatchExecutor> {
        &self.inner.executor
    }

    fn current(&self) -> MutexGuard<'_, Batch> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle to the current batch.
    pub fn current_batch(&self) -> Batch {
        self.current().clone()
    }

    /// Swap in `batch` as the current batch and return the previous one.
    pub fn replace_current_batch(&self, batch: Batch) -> Batch {
        std::mem::replace(&mut *self.current(), batch)
    }

    /// A fresh batch carrying this context's duplicate policy.
    pub fn new_batch(&self) -> Batch {
        Batch::with_policy(self.inner.config.duplicate_policy)
    }

    /// Execute `batch` through this context's executor.
    pub async fn execute(&self, batch: &Batch) -> Result<BatchResult> {
        execute_batch(batch, self.inner.executor.as_ref(), None).await
    }

    /// Execute `batch`, abandoning the round trip when `cancel` fires.
    ///
    /// A cancelled batch keeps its requests and can be executed again.
    pub async fn execute_with_cancel(
        &self,
        batch: &Batch,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        execute_batch(batch, self.inner.executor.as_ref(), Some(cancel)).await
    }

    /// Execute the current batch. The batch stays current and can be reused.
    pub async fn execute_current(&self) -> Result<BatchResult> {
        let batch = self.current_batch();
        self.execute(&batch).await
    }

    /// Site content type bound to this context.
    pub fn content_type(&self, id: impl Into<String>) -> ContentType {
        ContentType::new(self.clone(), id)
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.inner.config)
            .field("current_batch", &self.current_batch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchRequest, DuplicatePolicy, InMemoryBatchExecutor};

    fn context(policy: DuplicatePolicy) -> ClientContext {
        ClientContext::from_parts(
            ContextConfig::new().with_duplicate_policy(policy),
            Arc::new(InMemoryBatchExecutor::new()),
        )
    }

    #[test]
    fn current_batch_is_shared_between_clones() {
        let ctx = context(DuplicatePolicy::Reject);
        let other = ctx.clone();
        assert!(ctx.current_batch().same_batch(&other.current_batch()));
        assert_eq!(ctx.current_batch().policy(), DuplicatePolicy::Reject);
    }

    #[test]
    fn replace_current_batch_returns_previous() {
        let ctx = context(DuplicatePolicy::Allow);
        let before = ctx.current_batch();
        let fresh = ctx.new_batch();
        assert_eq!(fresh.policy(), DuplicatePolicy::Allow);
        let old = ctx.replace_current_batch(fresh.clone());
        assert!(old.same_batch(&before));
        assert!(ctx.current_batch().same_batch(&fresh));
    }

    #[tokio::test]
    async fn current_batch_reusable_after_execution() {
        let ctx = context(DuplicatePolicy::Reject);
        let req = || BatchRequest::new("POST", "_api/web/lists", "SP.List", serde_json::json!({}));
        ctx.current_batch().enqueue(req()).unwrap();
        assert_eq!(ctx.execute_current().await.unwrap().len(), 1);

        ctx.current_batch().enqueue(req()).unwrap();
        let again = ctx.execute_current().await.unwrap();
        assert_eq!(again.len(), 1);
        assert!(ctx.current_batch().is_empty());
    }
}
