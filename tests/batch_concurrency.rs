//! Concurrent enqueue, exclusive execution and cancellation.

use sp_model::batch::InMemoryBatchExecutor;
use sp_model::model::{ContentType, FieldLinkOptions};
use sp_model::{ClientContext, ContextConfig, EntityState, Error};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn setup(executor: Arc<InMemoryBatchExecutor>) -> (ClientContext, Arc<ContentType>) {
    let ctx = ClientContext::builder()
        .config(ContextConfig::new())
        .executor(executor)
        .build()
        .expect("context");
    let ct = Arc::new(ctx.content_type("0x0101"));
    (ctx, ct)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_get_one_total_order() {
    let executor = Arc::new(InMemoryBatchExecutor::new());
    let (ctx, ct) = setup(executor.clone());
    let batch = ctx.new_batch();

    let mut handles = Vec::new();
    for task in 0..8 {
        let ct = Arc::clone(&ct);
        let batch = batch.clone();
        handles.push(tokio::spawn(async move {
            let mut links = Vec::new();
            for i in 0..25 {
                let name = format!("Field_{}_{}", task, i);
                links.push(
                    ct.field_links()
                        .add_batch(&batch, name, FieldLinkOptions::default())
                        .expect("enqueue"),
                );
            }
            links
        }));
    }
    let links: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .flat_map(|h| h.unwrap())
        .collect();

    assert_eq!(links.len(), 200);
    assert_eq!(ct.field_links().len(), 200);
    assert_eq!(batch.len(), 200);
    assert_eq!(executor.calls(), 0);

    let queued = batch.correlation_ids();
    let result = ctx.execute(&batch).await.unwrap();
    assert_eq!(executor.calls(), 1);
    assert_eq!(result.len(), 200);

    let executed: Vec<_> = result.entries.iter().map(|e| e.correlation_id).collect();
    assert_eq!(executed, queued);
    assert!(executed.windows(2).all(|w| w[0] < w[1]));

    // Every entry maps back to exactly the entity that queued it.
    for link in &links {
        let entry = result.get(link.correlation_id().unwrap()).unwrap();
        assert_eq!(entry.entity_id, Some(link.id()));
        assert_eq!(entry.key.as_deref(), Some(link.field_internal_name().as_str()));
        assert_eq!(entry.remote_id().map(str::to_string), link.remote_id());
        assert!(link.is_committed());
    }
}

#[tokio::test]
async fn cancelled_execution_keeps_requests_pending() {
    let executor = Arc::new(InMemoryBatchExecutor::new().with_delay(Duration::from_millis(200)));
    let (ctx, ct) = setup(executor.clone());
    let batch = ctx.new_batch();

    let title = ct.field_links().add_batch(&batch, "Title", FieldLinkOptions::default()).unwrap();
    let status = ct.field_links().add_batch(&batch, "Status", FieldLinkOptions::default()).unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = ctx.execute_with_cancel(&batch, &token).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(executor.calls(), 0);
    assert_eq!(batch.len(), 2);
    assert!(!batch.is_executing());
    assert_eq!(title.state(), EntityState::Pending);
    assert_eq!(status.state(), EntityState::Pending);

    // Retrying the same batch materializes both.
    let result = ctx.execute(&batch).await.unwrap();
    assert_eq!(result.len(), 2);
    assert!(title.is_committed() && status.is_committed());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn dropped_execution_releases_batch() {
    let executor = Arc::new(InMemoryBatchExecutor::new().with_delay(Duration::from_millis(200)));
    let (ctx, ct) = setup(executor);
    let batch = ctx.new_batch();
    let link = ct.field_links().add_batch(&batch, "Title", FieldLinkOptions::default()).unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(20), ctx.execute(&batch)).await;
    assert!(timed_out.is_err());
    assert!(!batch.is_executing());
    assert_eq!(batch.len(), 1);
    assert!(link.is_pending());
}

#[tokio::test]
async fn second_execution_of_same_batch_is_refused() {
    let executor = Arc::new(InMemoryBatchExecutor::new().with_delay(Duration::from_millis(150)));
    let (ctx, ct) = setup(executor.clone());
    let batch = ctx.new_batch();
    ct.field_links().add_batch(&batch, "Title", FieldLinkOptions::default()).unwrap();

    let first = {
        let ctx = ctx.clone();
        let batch = batch.clone();
        tokio::spawn(async move { ctx.execute(&batch).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = ctx.execute(&batch).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    let result = first.await.unwrap().unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(executor.calls(), 1);

    // Nothing left to execute a second time.
    let again = ctx.execute(&batch).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn requests_queued_during_execution_wait_for_next_run() {
    let executor = Arc::new(InMemoryBatchExecutor::new().with_delay(Duration::from_millis(150)));
    let (ctx, ct) = setup(executor.clone());
    let batch = ctx.new_batch();
    let early = ct.field_links().add_batch(&batch, "Early", FieldLinkOptions::default()).unwrap();

    let running = {
        let ctx = ctx.clone();
        let batch = batch.clone();
        tokio::spawn(async move { ctx.execute(&batch).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    let late = ct.field_links().add_batch(&batch, "Late", FieldLinkOptions::default()).unwrap();

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert!(early.is_committed());
    assert!(late.is_pending());
    assert_eq!(batch.len(), 1);

    let second = ctx.execute(&batch).await.unwrap();
    assert_eq!(second.len(), 1);
    assert!(late.is_committed());
    assert_eq!(executor.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_names_never_enter_current_batch() {
    let executor = Arc::new(InMemoryBatchExecutor::new());
    let (ctx, ct) = setup(executor.clone());

    let handles: Vec<_> = (0..8)
        .map(|task| {
            let ct = Arc::clone(&ct);
            tokio::spawn(async move {
                let mut rejected = 0usize;
                for i in 0..20 {
                    let name = if i % 2 == 0 { String::new() } else { format!("Field_{}_{}", task, i) };
                    match ct.field_links().add_batch_current(name, FieldLinkOptions::default()) {
                        Ok(_) => {}
                        Err(Error::InvalidArgument { .. }) => rejected += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                rejected
            })
        })
        .collect();
    let rejected: usize = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|h| h.unwrap())
        .sum();

    assert_eq!(rejected, 80);
    assert_eq!(ct.field_links().len(), 80);
    assert!(ct
        .field_links()
        .entities()
        .iter()
        .all(|e| e.is_pending() && !e.field_internal_name().is_empty()));
    assert_eq!(ctx.current_batch().len(), 80);

    let result = ctx.execute_current().await.unwrap();
    assert_eq!(result.success_count(), 80);
    assert!(executor
        .requests_seen()
        .iter()
        .all(|r| r.key.as_deref().is_some_and(|k| !k.is_empty())));
}
