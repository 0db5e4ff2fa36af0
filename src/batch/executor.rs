//! Batch executor.

use super::collector::{Batch, BatchRequest, CorrelationId};
use crate::error::RemoteFailure;
use crate::error_code::RemoteErrorCode;
use crate::model::entity::EntityId;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome reported by an executor for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub correlation_id: CorrelationId,
    /// Server-assigned identity on success.
    pub result: std::result::Result<String, RemoteFailure>,
}

impl RequestOutcome {
    pub fn success(correlation_id: CorrelationId, remote_id: impl Into<String>) -> Self {
        Self {
            correlation_id,
            result: Ok(remote_id.into()),
        }
    }

    pub fn failure(correlation_id: CorrelationId, failure: RemoteFailure) -> Self {
        Self {
            correlation_id,
            result: Err(failure),
        }
    }
}

/// Performs the network round trip for a batch.
///
/// Implementations receive the requests in insertion order and return one
/// outcome per request, matched back by correlation id. Returning `Err` means
/// the round trip as a whole failed; returning `Err(Error::Cancelled)` means it
/// was abandoned and the requests should stay queued.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn execute(&self, requests: &[BatchRequest]) -> Result<Vec<RequestOutcome>>;
}

/// Result of one executed request, in the batch's insertion order.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub correlation_id: CorrelationId,
    pub entity_type: &'static str,
    pub key: Option<String>,
    pub entity_id: Option<EntityId>,
    pub outcome: std::result::Result<String, RemoteFailure>,
}

impl RequestResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        self.outcome.as_ref().err()
    }

    /// Turn a failed entry into `Error::RemoteOperationFailed`.
    pub fn into_result(self) -> Result<String> {
        let id = self.correlation_id;
        self.outcome.map_err(|failure| Error::remote(id, failure))
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub entries: Vec<RequestResult>,
    pub execution_time: Duration,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(RequestResult::is_success)
    }
    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }
    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.entries.len() as f64
        }
    }
    pub fn get(&self, correlation_id: CorrelationId) -> Option<&RequestResult> {
        self.entries
            .iter()
            .find(|e| e.correlation_id == correlation_id)
    }
    pub fn failures(&self) -> impl Iterator<Item = &RequestResult> {
        self.entries.iter().filter(|e| !e.is_success())
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute everything currently queued in `batch` with one executor call.
///
/// Requests are removed once their outcome has been applied to the
/// originating entity. On cancellation nothing is removed and the entities
/// stay `Pending`, so the same batch can be executed again.
pub async fn execute_batch(
    batch: &Batch,
    executor: &dyn BatchExecutor,
    cancel: Option<&CancellationToken>,
) -> Result<BatchResult> {
    let guard = batch.begin_execution()?;
    let requests = guard.snapshot();
    if requests.is_empty() {
        debug!(batch_id = %batch.id(), "batch empty, nothing to execute");
        return Ok(BatchResult::new());
    }

    let start = Instant::now();
    info!(batch_id = %batch.id(), requests = requests.len(), "executing batch");

    let round_trip = executor.execute(&requests);
    let response = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            r = round_trip => r,
        },
        None => round_trip.await,
    };

    let mut by_id: HashMap<CorrelationId, std::result::Result<String, RemoteFailure>> =
        HashMap::new();
    match response {
        Err(Error::Cancelled) => {
            warn!(
                batch_id = %batch.id(),
                requests = requests.len(),
                "batch execution cancelled, requests stay pending"
            );
            return Err(Error::Cancelled);
        }
        Err(e) => {
            warn!(batch_id = %batch.id(), error = %e, "batch round trip failed");
            let failure = e.to_remote_failure();
            for r in &requests {
                by_id.insert(r.correlation_id, Err(failure.clone()));
            }
        }
        Ok(outcomes) => {
            for outcome in outcomes {
                if by_id.contains_key(&outcome.correlation_id) {
                    warn!(
                        batch_id = %batch.id(),
                        correlation_id = %outcome.correlation_id,
                        "duplicate outcome ignored"
                    );
                    continue;
                }
                by_id.insert(outcome.correlation_id, outcome.result);
            }
        }
    }

    let mut result = BatchResult::new();
    let mut executed = Vec::with_capacity(requests.len());
    for request in requests {
        let outcome = by_id.remove(&request.correlation_id).unwrap_or_else(|| {
            Err(RemoteFailure::new(
                RemoteErrorCode::Unknown,
                "no response for request",
            ))
        });

        if let Some(target) = request.target.as_ref().and_then(|w| w.upgrade()) {
            let applied = match &outcome {
                Ok(remote_id) => target.commit(remote_id.clone()),
                Err(failure) => target.fail(failure.clone()),
            };
            if !applied {
                warn!(
                    correlation_id = %request.correlation_id,
                    entity_type = request.entity_type,
                    "entity no longer pending, outcome not applied"
                );
            }
        } else if request.target.is_some() {
            debug!(
                correlation_id = %request.correlation_id,
                "originating entity dropped before outcome arrived"
            );
        }

        executed.push(request.correlation_id);
        result.entries.push(RequestResult {
            correlation_id: request.correlation_id,
            entity_type: request.entity_type,
            key: request.key,
            entity_id: request.entity_id,
            outcome,
        });
    }

    for stray in by_id.keys() {
        warn!(batch_id = %batch.id(), correlation_id = %stray, "outcome for unknown request ignored");
    }

    batch.complete(&executed);
    drop(guard);

    result.execution_time = start.elapsed();
    info!(
        batch_id = %batch.id(),
        succeeded = result.success_count(),
        failed = result.failure_count(),
        elapsed_ms = result.execution_time.as_millis() as u64,
        "batch executed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::InMemoryBatchExecutor;
    use serde_json::json;

    fn request(key: &str) -> BatchRequest {
        BatchRequest::new("POST", "_api/web/lists", "SP.List", json!({ "Title": key })).with_key(key)
    }

    struct Scripted(Vec<RequestOutcome>);

    #[async_trait]
    impl BatchExecutor for Scripted {
        async fn execute(&self, _requests: &[BatchRequest]) -> Result<Vec<RequestOutcome>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn empty_batch_skips_executor() {
        let executor = InMemoryBatchExecutor::new();
        let result = execute_batch(&Batch::new(), &executor, None).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn results_follow_insertion_order_not_response_order() {
        let batch = Batch::new();
        let a = batch.enqueue(request("a")).unwrap();
        let b = batch.enqueue(request("b")).unwrap();
        let executor = Scripted(vec![
            RequestOutcome::success(b, "id-b"),
            RequestOutcome::success(a, "id-a"),
        ]);

        let result = execute_batch(&batch, &executor, None).await.unwrap();
        let ids: Vec<_> = result.entries.iter().map(|e| e.correlation_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(result.get(a).and_then(|e| e.remote_id()), Some("id-a"));
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn missing_and_stray_outcomes() {
        let batch = Batch::new();
        let a = batch.enqueue(request("a")).unwrap();
        let b = batch.enqueue(request("b")).unwrap();
        let executor = Scripted(vec![
            RequestOutcome::success(a, "id-a"),
            RequestOutcome::success(CorrelationId::new(99), "ghost"),
        ]);

        let result = execute_batch(&batch, &executor, None).await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.get(a).unwrap().is_success());
        let missing = result.get(b).unwrap().failure().unwrap();
        assert_eq!(missing.code, RemoteErrorCode::Unknown);
        assert_eq!(result.success_rate(), 0.5);
    }

    #[tokio::test]
    async fn into_result_surfaces_remote_error() {
        let entry = RequestResult {
            correlation_id: CorrelationId::new(4),
            entity_type: "SP.List",
            key: None,
            entity_id: None,
            outcome: Err(RemoteFailure::from_status(400, "bad")),
        };
        let err = entry.into_result().unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteOperationFailed { correlation_id, .. } if correlation_id == CorrelationId::new(4)
        ));
    }
}
