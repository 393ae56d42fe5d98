use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::queue::{OrderQueue, QueueJob};
use crate::redis::RedisPool;

use super::order_lifecycle::OrderLifecycle;

const EXEC_QUEUE_NAME: &str = "exec/queue";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);
const DEDUPE_WINDOW: Duration = Duration::from_secs(3600);
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionJob {
    pub order_id: Uuid,
}

/// Enqueue an order for execution. Job key is the `orderId` itself, so a
/// duplicate enqueue for an order already queued or executing is a no-op.
pub async fn enqueue(redis: RedisPool, order_id: Uuid) -> Result<bool, redis::RedisError> {
    let queue = OrderQueue::new(redis, order_id, EXEC_QUEUE_NAME);
    let job = QueueJob::new(order_id.to_string(), ExecutionJob { order_id }, MAX_ATTEMPTS);
    queue.enqueue(job, DEDUPE_WINDOW).await
}

/// Spawn the single execution worker bound to this order's execution queue.
/// Concurrency is nominally configurable but in practice an order only ever
/// has one job in flight (§4.6).
pub fn spawn_execution_worker(
    redis: RedisPool,
    lifecycle: OrderLifecycle,
    order_id: Uuid,
    concurrency: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let queue = OrderQueue::new(redis, order_id, EXEC_QUEUE_NAME);
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        loop {
            let job = match queue.dequeue::<ExecutionJob>(DEQUEUE_TIMEOUT).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "execution worker dequeue error");
                    continue;
                }
            };

            let permit = semaphore.clone().acquire_owned().await;
            let lifecycle = lifecycle.clone();
            let queue_retry = OrderQueue::new(lifecycle.redis(), order_id, EXEC_QUEUE_NAME);

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = lifecycle.run(job.payload.order_id).await {
                    tracing::error!(order_id = %job.payload.order_id, error = %e, "lifecycle run failed; surfacing to logs only");
                    let _ = queue_retry.retry(job, BACKOFF_BASE).await;
                }
            });
        }
    })
}
