//! In-memory executor for tests and offline use.

use super::collector::BatchRequest;
use super::executor::{BatchExecutor, RequestOutcome};
use crate::error::RemoteFailure;
use crate::transport::TransportError;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct Script {
    /// Failures keyed by request key (e.g. field internal name).
    failures: HashMap<String, RemoteFailure>,
    /// When set, every round trip fails as a whole with this HTTP status.
    unavailable: Option<(u16, String)>,
    delay: Option<Duration>,
}

/// Executor that "materializes" requests by assigning fresh identities.
///
/// Every call and every request seen is recorded, which makes it the usual
/// stand-in for the remote service in tests.
#[derive(Default)]
pub struct InMemoryBatchExecutor {
    calls: AtomicUsize,
    seen: Mutex<Vec<BatchRequest>>,
    script: Mutex<Script>,
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryBatchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request whose key equals `key`.
    pub fn fail_key(self, key: impl Into<String>, failure: RemoteFailure) -> Self {
        relock(&self.script).failures.insert(key.into(), failure);
        self
    }

    /// Fail the whole round trip with an HTTP status.
    pub fn unavailable(self, status: u16, message: impl Into<String>) -> Self {
        relock(&self.script).unavailable = Some((status, message.into()));
        self
    }

    /// Sleep before answering, so executions can be observed in flight.
    pub fn with_delay(self, delay: Duration) -> Self {
        relock(&self.script).delay = Some(delay);
        self
    }

    /// Number of round trips performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, across all calls, in the order received.
    pub fn requests_seen(&self) -> Vec<BatchRequest> {
        relock(&self.seen).clone()
    }
}

#[async_trait]
impl BatchExecutor for InMemoryBatchExecutor {
    async fn execute(&self, requests: &[BatchRequest]) -> Result<Vec<RequestOutcome>> {
        let delay = relock(&self.script).delay;
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        relock(&self.seen).extend(requests.iter().cloned());

        let script = relock(&self.script);
        if let Some((status, message)) = &script.unavailable {
            return Err(Error::Transport(TransportError::Status {
                status: *status,
                message: message.clone(),
            }));
        }

        Ok(requests
            .iter()
            .map(|r| {
                let scripted = r.key.as_ref().and_then(|k| script.failures.get(k));
                match scripted {
                    Some(failure) => RequestOutcome::failure(r.correlation_id, failure.clone()),
                    None => RequestOutcome::success(r.correlation_id, Uuid::new_v4().to_string()),
                }
            })
            .collect())
    }
}
