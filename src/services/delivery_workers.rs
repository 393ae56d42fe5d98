use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::middleware::rate_limit;
use crate::models::event::{StatusEvent, WireFrame};
use crate::models::order::OrderStatus;
use crate::queue::OrderQueue;
use crate::redis::RedisPool;

use super::event_publisher::status_queue_name;
use super::push_registry::PushRegistry;

const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Spawn the six per-status delivery workers for one order. Each drains its
/// status queue and invokes `PushRegistry::emit`; "no subscribers" counts as
/// delivered, not an error (§4.3).
pub fn spawn_delivery_workers(
    redis: RedisPool,
    registry: PushRegistry,
    order_id: Uuid,
    concurrency: usize,
    rate_limit_per_minute: u32,
) -> Vec<JoinHandle<()>> {
    [
        OrderStatus::Pending,
        OrderStatus::Routing,
        OrderStatus::Building,
        OrderStatus::Submitted,
        OrderStatus::Confirmed,
        OrderStatus::Failed,
    ]
    .into_iter()
    .map(|status| {
        spawn_one(
            redis.clone(),
            registry.clone(),
            order_id,
            status,
            concurrency,
            rate_limit_per_minute,
        )
    })
    .collect()
}

fn spawn_one(
    redis: RedisPool,
    registry: PushRegistry,
    order_id: Uuid,
    status: OrderStatus,
    concurrency: usize,
    rate_limit_per_minute: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let queue = OrderQueue::new(redis.clone(), order_id, status_queue_name(status));
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let rate_key = format!("mqe:{order_id}:ratelimit:{}", status_queue_name(status));

        loop {
            let job = match queue.dequeue::<StatusEvent>(DEQUEUE_TIMEOUT).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%order_id, ?status, error = %e, "delivery worker dequeue error");
                    continue;
                }
            };

            let mut conn = redis.clone();
            match rate_limit::check_rate_limit(&mut conn, &rate_key, rate_limit_per_minute, 60)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(%order_id, ?status, "delivery worker rate limited; dropping job");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(%order_id, ?status, error = %e, "rate limit check failed; proceeding");
                }
            }

            let permit = semaphore.clone().acquire_owned().await;
            let registry = registry.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let event = job.payload;
                let delivered = registry
                    .emit(order_id, &WireFrame::StatusUpdate(event))
                    .await;
                tracing::debug!(%order_id, ?status, delivered, "status event delivered");
            });
        }
    })
}
